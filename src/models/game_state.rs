use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::game::engine;
use crate::models::messages::GameRecord;

/// Sentinel the backend uses for the initial position
pub const STARTPOS: &str = "startpos";

/// Opaque game identifier
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side to move
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    #[serde(rename = "w", alias = "white")]
    White,
    #[serde(rename = "b", alias = "black")]
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<chess::Color> for Side {
    fn from(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Side::White,
            chess::Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => f.write_str("white"),
            Side::Black => f.write_str("black"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Completed,
    /// Anything else the backend reports (e.g. an invite nobody accepted yet).
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    #[serde(alias = "1-0")]
    White,
    #[serde(alias = "0-1")]
    Black,
    #[serde(alias = "1/2-1/2")]
    Draw,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DrawOfferStatus {
    Pending,
    Accepted,
    #[serde(alias = "denied")]
    Declined,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub san: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawOffer {
    pub status: DrawOfferStatus,
    /// User id of the player who made the offer.
    pub by: Option<String>,
    pub at: Option<String>,
}

/// Remaining time per side as of `last_clock_at`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Clocks {
    pub white_ms: i64,
    pub black_ms: i64,
    pub last_clock_at: Option<String>,
    pub initial_ms: Option<i64>,
}

impl Clocks {
    pub fn is_timed(&self) -> bool {
        self.initial_ms.is_some()
    }
}

/// The client's view of one game
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameState {
    pub id: GameId,
    pub fen: String,
    pub turn: Side,
    pub status: GameStatus,
    pub result: Option<GameResult>,
    pub white_user_id: Option<String>,
    pub black_user_id: Option<String>,
    pub last_move: Option<LastMove>,
    pub draw_offer: Option<DrawOffer>,
    pub clocks: Option<Clocks>,
}

impl GameState {
    /// Builds the state from a freshly fetched record.
    pub fn from_record(record: &GameRecord, requested: &GameId) -> GameState {
        let fen = record.fen.clone().unwrap_or_else(|| STARTPOS.to_string());
        let turn = record.turn.unwrap_or_else(|| engine::side_to_move(&fen));
        let mut state = GameState {
            id: record
                .id
                .as_ref()
                .map(|id| GameId::new(id.to_string()))
                .unwrap_or_else(|| requested.clone()),
            fen,
            turn,
            status: record.status.unwrap_or(GameStatus::Active),
            result: record.result,
            white_user_id: record.white_user_id.as_ref().map(ToString::to_string),
            black_user_id: record.black_user_id.as_ref().map(ToString::to_string),
            last_move: None,
            draw_offer: draw_offer_of(record),
            clocks: None,
        };
        state.last_move = last_move_of(record);
        state.clocks = clocks_of(record, None);
        state
    }

    /// Overwrites every field the record carries. Fields the record omits keep
    /// their current value.
    pub fn overlay(&mut self, record: &GameRecord) {
        if let Some(fen) = &record.fen {
            self.fen = fen.clone();
            self.turn = record.turn.unwrap_or_else(|| engine::side_to_move(fen));
        } else if let Some(turn) = record.turn {
            self.turn = turn;
        }
        if let Some(status) = record.status {
            self.status = status;
        }
        if record.result.is_some() || record.status.is_some() {
            self.result = record.result;
        }
        if let Some(id) = &record.white_user_id {
            self.white_user_id = Some(id.to_string());
        }
        if let Some(id) = &record.black_user_id {
            self.black_user_id = Some(id.to_string());
        }
        if let Some(last_move) = last_move_of(record) {
            self.last_move = Some(last_move);
        }
        if record.draw_offer_status.is_some()
            || record.draw_offer_by.is_some()
            || record.draw_offer_at.is_some()
        {
            self.draw_offer = draw_offer_of(record);
        }
        self.clocks = clocks_of(record, self.clocks.as_ref());
    }

    /// Merges a full snapshot of the game. Unlike `overlay`, an absent draw
    /// offer means the offer is gone.
    pub fn merge_snapshot(&mut self, record: &GameRecord) {
        self.overlay(record);
        self.draw_offer = draw_offer_of(record);
    }

    /// Draw offer as described by `record`.
    pub fn draw_offer_in(record: &GameRecord) -> Option<DrawOffer> {
        draw_offer_of(record)
    }

    /// FEN with the `startpos` sentinel resolved.
    pub fn board_fen(&self) -> &str {
        engine::resolve_fen(&self.fen)
    }

    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    pub fn is_completed(&self) -> bool {
        self.status == GameStatus::Completed
    }

    /// Which side `user_id` plays, if any.
    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if self.white_user_id.as_deref() == Some(user_id) {
            Some(Side::White)
        } else if self.black_user_id.as_deref() == Some(user_id) {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn player_id(&self, side: Side) -> Option<&str> {
        match side {
            Side::White => self.white_user_id.as_deref(),
            Side::Black => self.black_user_id.as_deref(),
        }
    }

    /// Colour of the player who made the current draw offer.
    pub fn draw_offer_side(&self) -> Option<Side> {
        let by = self.draw_offer.as_ref()?.by.as_deref()?;
        self.side_of(by)
    }
}

fn last_move_of(record: &GameRecord) -> Option<LastMove> {
    match (&record.last_move_from, &record.last_move_to) {
        (Some(from), Some(to)) => Some(LastMove {
            from: from.clone(),
            to: to.clone(),
            san: record.san().map(str::to_string),
        }),
        _ => None,
    }
}

fn draw_offer_of(record: &GameRecord) -> Option<DrawOffer> {
    record.draw_offer_status.map(|status| DrawOffer {
        status,
        by: record.draw_offer_by.as_ref().map(ToString::to_string),
        at: record.draw_offer_at.clone(),
    })
}

fn clocks_of(record: &GameRecord, previous: Option<&Clocks>) -> Option<Clocks> {
    let touched = record.white_time_ms.is_some()
        || record.black_time_ms.is_some()
        || record.initial_time_ms.is_some()
        || record.last_clock_at.is_some();
    if !touched {
        return previous.cloned();
    }
    Some(Clocks {
        white_ms: record
            .white_time_ms
            .or(previous.map(|c| c.white_ms))
            .unwrap_or(0),
        black_ms: record
            .black_time_ms
            .or(previous.map(|c| c.black_ms))
            .unwrap_or(0),
        last_clock_at: record
            .last_clock_at
            .clone()
            .or_else(|| previous.and_then(|c| c.last_clock_at.clone())),
        initial_ms: record
            .initial_time_ms
            .or_else(|| previous.and_then(|c| c.initial_ms)),
    })
}

/// A move as the player entered it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MoveInput {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

impl MoveInput {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: impl Into<String>) -> Self {
        self.promotion = Some(piece.into());
        self
    }

    /// Parses coordinate notation such as `e2e4` or `e7e8q`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.is_ascii() || !(text.len() == 4 || text.len() == 5) {
            return None;
        }
        let mut mv = MoveInput::new(&text[0..2], &text[2..4]);
        if text.len() == 5 {
            mv = mv.with_promotion(&text[4..5]);
        }
        Some(mv)
    }
}

/// One in-flight move submission; serialises as the `POST /games/{id}/move` body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub request_id: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl PendingMove {
    pub fn new(input: &MoveInput) -> Self {
        Self {
            request_id: new_request_id(),
            from: input.from.clone(),
            to: input.to.clone(),
            promotion: input.promotion.clone(),
        }
    }
}

/// Idempotency token: submission time plus a random suffix.
pub fn new_request_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("m_{}_{}", Utc::now().timestamp_millis(), &suffix[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::messages::WireId;

    fn record() -> GameRecord {
        GameRecord {
            id: Some(WireId::Number(5)),
            fen: Some(STARTPOS.to_string()),
            status: Some(GameStatus::Active),
            white_user_id: Some(WireId::Number(1)),
            black_user_id: Some(WireId::Number(2)),
            ..GameRecord::default()
        }
    }

    #[test]
    fn from_record_derives_turn_from_fen() {
        let mut rec = record();
        rec.fen = Some("4k3/8/8/8/8/8/8/4K3 b - - 0 1".to_string());
        let state = GameState::from_record(&rec, &GameId::new("5"));
        assert_eq!(state.turn, Side::Black);
        assert_eq!(state.id.as_str(), "5");
        assert_eq!(state.side_of("2"), Some(Side::Black));
        assert_eq!(state.clocks, None);
    }

    #[test]
    fn overlay_keeps_clocks_the_record_omits() {
        let mut rec = record();
        rec.white_time_ms = Some(60_000);
        rec.black_time_ms = Some(60_000);
        rec.initial_time_ms = Some(60_000);
        let mut state = GameState::from_record(&rec, &GameId::new("5"));

        let update = GameRecord {
            fen: Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string()),
            white_time_ms: Some(58_000),
            last_move_from: Some("e2".to_string()),
            last_move_to: Some("e4".to_string()),
            ..GameRecord::default()
        };
        state.overlay(&update);

        let clocks = state.clocks.unwrap();
        assert_eq!(clocks.white_ms, 58_000);
        assert_eq!(clocks.black_ms, 60_000);
        assert!(clocks.is_timed());
        assert_eq!(state.turn, Side::Black);
        assert_eq!(state.last_move.unwrap().to, "e4");
    }

    #[test]
    fn draw_offer_side_maps_user_to_colour() {
        let mut rec = record();
        rec.draw_offer_status = Some(DrawOfferStatus::Pending);
        rec.draw_offer_by = Some(WireId::Text("2".to_string()));
        let state = GameState::from_record(&rec, &GameId::new("5"));
        assert_eq!(state.draw_offer_side(), Some(Side::Black));
    }

    #[test]
    fn parse_coordinate_moves() {
        assert_eq!(MoveInput::parse("e2e4"), Some(MoveInput::new("e2", "e4")));
        assert_eq!(
            MoveInput::parse("a7a8q"),
            Some(MoveInput::new("a7", "a8").with_promotion("q"))
        );
        assert_eq!(MoveInput::parse("e2"), None);
    }

    #[test]
    fn request_ids_are_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert!(a.starts_with("m_"));
        assert_ne!(a, b);
    }

    #[test]
    fn pending_move_body_omits_missing_promotion() {
        let pending = PendingMove::new(&MoveInput::new("e2", "e4"));
        let body = serde_json::to_value(&pending).unwrap();
        assert_eq!(body["from"], "e2");
        assert!(body.get("promotion").is_none());
    }
}
