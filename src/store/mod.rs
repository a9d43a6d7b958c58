//! Remote game store: the backend the session synchronises against.

pub mod auth;
pub mod http;
pub mod routes;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::game::draw::DrawClaimReason;
use crate::models::{GameId, GameRecord, PendingMove};

pub use auth::{EnvToken, StaticToken, TokenSource};
pub use http::HttpGameStore;

/// Authoritative game state and the operations that mutate it
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Id of the signed-in user. Fails with `NotAuthenticated` when there is
    /// no credential or it names nobody.
    fn viewer_id(&self) -> Result<String, ClientError>;

    async fn fetch_game(&self, id: &GameId) -> Result<GameRecord, ClientError>;

    /// Submits one move; the response is the post-move state.
    async fn submit_move(&self, id: &GameId, pending: &PendingMove)
        -> Result<GameRecord, ClientError>;

    async fn resign(&self, id: &GameId) -> Result<(), ClientError>;

    async fn offer_draw(&self, id: &GameId) -> Result<(), ClientError>;

    async fn respond_to_draw(&self, id: &GameId, accept: bool) -> Result<(), ClientError>;

    async fn claim_draw(&self, id: &GameId, reason: DrawClaimReason) -> Result<(), ClientError>;

    /// Creates the rematch and returns the new game.
    async fn rematch(&self, id: &GameId) -> Result<GameRecord, ClientError>;
}
