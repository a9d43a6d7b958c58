use actix::prelude::*;
use serde::Serialize;

use super::reconciler::{Alert, Derived, MoveRejection};
use crate::error::ClientError;
use crate::game::clock::LiveClock;
use crate::game::draw::DrawClaimReason;
use crate::models::{GameId, GameResult, GameState, MoveInput, PendingMove};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Loading,
    Ready,
    Failed,
}

/// Game actions other than moves, each guarded by its own busy flag
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameAction {
    Resign,
    OfferDraw,
    RespondToDraw,
    ClaimDraw,
    Rematch,
}

/// Snapshot of the session for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub game_id: GameId,
    pub phase: SessionPhase,
    pub state: Option<GameState>,
    pub derived: Option<Derived>,
    pub pending_move: Option<PendingMove>,
    pub busy: Vec<GameAction>,
    pub clock: Option<LiveClock>,
    pub live: bool,
    pub last_error: Option<ClientError>,
}

/// Pushed to the subscriber as the session changes
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(Box<GameState>),
    Alert(Alert),
    GameOver(Option<GameResult>),
    Error(ClientError),
    AuthRequired,
}

/// Fetches the authoritative state and resets the session to it.
#[derive(Message)]
#[rtype(result = "Result<GameView, ClientError>")]
pub struct Load;

/// The game became visible: polling may run.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Focus;

/// The game is no longer visible: polling stops and results in flight are dropped.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Blur;

/// Stops the session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Close;

#[derive(Message)]
#[rtype(result = "GameView")]
pub struct GetView;

/// Destination squares for the local player's piece on `from`.
#[derive(Message)]
#[rtype(result = "Vec<String>")]
pub struct LegalTargets {
    pub from: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Another submission is in flight; nothing happened.
    Busy,
    /// Refused locally; the network was not touched.
    Rejected(MoveRejection),
    Confirmed(Box<GameView>),
}

#[derive(Message)]
#[rtype(result = "Result<SubmitOutcome, ClientError>")]
pub struct SubmitMove(pub MoveInput);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome<T> {
    Busy,
    /// Not allowed in the current state of the game.
    Unavailable,
    Done(T),
}

#[derive(Message)]
#[rtype(result = "Result<ActionOutcome<()>, ClientError>")]
pub struct Resign;

#[derive(Message)]
#[rtype(result = "Result<ActionOutcome<()>, ClientError>")]
pub struct OfferDraw;

#[derive(Message)]
#[rtype(result = "Result<ActionOutcome<()>, ClientError>")]
pub struct RespondToDraw {
    pub accept: bool,
}

#[derive(Message)]
#[rtype(result = "Result<ActionOutcome<()>, ClientError>")]
pub struct ClaimDraw(pub DrawClaimReason);

/// Creates a rematch; the new game needs its own session.
#[derive(Message)]
#[rtype(result = "Result<ActionOutcome<GameId>, ClientError>")]
pub struct Rematch;
