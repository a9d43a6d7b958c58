use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::auth::{user_id_from_token, TokenSource};
use super::routes::Route;
use super::GameStore;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::game::draw::DrawClaimReason;
use crate::models::{error_message, ClaimDrawRequest, GameId, GameRecord, PendingMove};

/// `GameStore` backed by the platform's REST API
#[derive(Clone)]
pub struct HttpGameStore {
    client: Client,
    api_base: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpGameStore {
    pub fn new(api_base: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self::new(config.api_base.clone(), tokens)
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.tokens
            .token()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ClientError::NotAuthenticated)
    }

    /// Sends the request and returns the body of a 2xx response.
    async fn send(&self, request: RequestBuilder, id: &GameId) -> Result<String, ClientError> {
        let response = request.bearer_auth(self.bearer()?).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }
        if status == StatusCode::NOT_FOUND {
            warn!("Game {} not found", id);
            return Err(ClientError::NotFound(id.to_string()));
        }
        let message = error_message(status.as_u16(), &body);
        warn!("Request for game {} failed with {}: {}", id, status, message);
        Err(ClientError::http(status.as_u16(), message))
    }

    async fn get_record(&self, route: Route<'_>, id: &GameId) -> Result<GameRecord, ClientError> {
        let url = route.url(&self.api_base);
        debug!("GET {}", url);
        let body = self.send(self.client.get(url), id).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post(
        &self,
        route: Route<'_>,
        id: &GameId,
        body: serde_json::Value,
    ) -> Result<String, ClientError> {
        let url = route.url(&self.api_base);
        debug!("POST {}", url);
        self.send(self.client.post(url).json(&body), id).await
    }
}

#[async_trait]
impl GameStore for HttpGameStore {
    fn viewer_id(&self) -> Result<String, ClientError> {
        let token = self.bearer()?;
        user_id_from_token(&token).ok_or(ClientError::NotAuthenticated)
    }

    async fn fetch_game(&self, id: &GameId) -> Result<GameRecord, ClientError> {
        self.get_record(Route::Game(id), id).await
    }

    async fn submit_move(
        &self,
        id: &GameId,
        pending: &PendingMove,
    ) -> Result<GameRecord, ClientError> {
        let body = serde_json::to_value(pending)?;
        let text = self.post(Route::Move(id), id, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn resign(&self, id: &GameId) -> Result<(), ClientError> {
        self.post(Route::Resign(id), id, json!({ "gameId": id })).await?;
        Ok(())
    }

    async fn offer_draw(&self, id: &GameId) -> Result<(), ClientError> {
        self.post(Route::OfferDraw(id), id, json!({ "gameId": id })).await?;
        Ok(())
    }

    async fn respond_to_draw(&self, id: &GameId, accept: bool) -> Result<(), ClientError> {
        let route = if accept {
            Route::AcceptDraw(id)
        } else {
            Route::DenyDraw(id)
        };
        self.post(route, id, json!({ "gameId": id })).await?;
        Ok(())
    }

    async fn claim_draw(&self, id: &GameId, reason: DrawClaimReason) -> Result<(), ClientError> {
        let body = serde_json::to_value(ClaimDrawRequest { reason })?;
        self.post(Route::ClaimDraw(id), id, body).await?;
        Ok(())
    }

    async fn rematch(&self, id: &GameId) -> Result<GameRecord, ClientError> {
        let text = self.post(Route::Rematch(id), id, json!({ "gameId": id })).await?;
        Ok(serde_json::from_str(&text)?)
    }
}
