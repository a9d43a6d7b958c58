use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::game::draw::DrawClaimReason;
use crate::models::game_state::{DrawOfferStatus, GameResult, GameStatus, Side};

/// Identifier as the backend sends it: ids are numeric in practice but
/// some routes echo them back as strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Number(n) => write!(f, "{n}"),
            WireId::Text(s) => f.write_str(s),
        }
    }
}

/// Game record returned by `GET /games/{id}` and by every mutating game route
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GameRecord {
    pub id: Option<WireId>,
    pub fen: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub turn: Option<Side>,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<GameStatus>,
    #[serde(deserialize_with = "lenient")]
    pub result: Option<GameResult>,
    pub white_user_id: Option<WireId>,
    pub black_user_id: Option<WireId>,
    pub last_move_from: Option<String>,
    pub last_move_to: Option<String>,
    pub last_move_san: Option<String>,
    /// Move responses nest the SAN of the move just played here.
    #[serde(rename = "move")]
    pub played: Option<PlayedMove>,
    #[serde(deserialize_with = "lenient")]
    pub draw_offer_status: Option<DrawOfferStatus>,
    pub draw_offer_by: Option<WireId>,
    pub draw_offer_at: Option<String>,
    pub white_time_ms: Option<i64>,
    pub black_time_ms: Option<i64>,
    pub last_clock_at: Option<String>,
    pub initial_time_ms: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PlayedMove {
    pub san: Option<String>,
}

impl GameRecord {
    pub fn san(&self) -> Option<&str> {
        self.last_move_san
            .as_deref()
            .or_else(|| self.played.as_ref().and_then(|m| m.san.as_deref()))
    }
}

/// Body of `POST /games/{id}/draw/claim`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClaimDrawRequest {
    pub reason: DrawClaimReason,
}

/// Error body some routes send instead of plain text
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Picks the human readable message out of a non-2xx body.
pub fn error_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {status}");
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(message),
            ..
        })
        | Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => body.to_string(),
    }
}

/// Unknown enum values decode as absent instead of failing the whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
