use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::engine;

/// Half-move clock value at which the fifty-move rule can be claimed.
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Grounds on which a player can claim a draw
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DrawClaimReason {
    Threefold,
    FiftyMove,
    InsufficientMaterial,
}

impl DrawClaimReason {
    pub fn label(self) -> &'static str {
        match self {
            DrawClaimReason::Threefold => "Threefold",
            DrawClaimReason::FiftyMove => "50-move",
            DrawClaimReason::InsufficientMaterial => "Insufficient material",
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            DrawClaimReason::Threefold => "Same position occurred three times.",
            DrawClaimReason::FiftyMove => "No pawn move or capture in 50 full moves.",
            DrawClaimReason::InsufficientMaterial => "Neither side has mating material.",
        }
    }
}

impl fmt::Display for DrawClaimReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawClaimOption {
    pub reason: DrawClaimReason,
    pub label: &'static str,
    pub detail: &'static str,
}

impl From<DrawClaimReason> for DrawClaimOption {
    fn from(reason: DrawClaimReason) -> Self {
        Self {
            reason,
            label: reason.label(),
            detail: reason.detail(),
        }
    }
}

/// Draw claims available in `fen`.
///
/// `history` holds the position keys seen so far, the current one
/// included. An unparsable FEN yields no claims.
pub fn draw_claims(fen: &str, history: &[String]) -> Vec<DrawClaimOption> {
    let board = match engine::parse_board(fen) {
        Ok(board) => board,
        Err(_) => return Vec::new(),
    };

    let mut claims = Vec::new();

    let key = engine::position_key(fen);
    if history.iter().filter(|seen| **seen == key).count() >= 3 {
        claims.push(DrawClaimReason::Threefold.into());
    }

    if engine::halfmove_clock(fen).is_some_and(|clock| clock >= FIFTY_MOVE_HALFMOVES) {
        claims.push(DrawClaimReason::FiftyMove.into());
    }

    if engine::has_insufficient_material(&board) {
        claims.push(DrawClaimReason::InsufficientMaterial.into());
    }

    claims
}
