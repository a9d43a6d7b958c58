//! Thin wrapper over the `chess` crate: FEN in, FEN out.

use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square, EMPTY};
use serde::Serialize;
use std::str::FromStr;

use crate::error::EngineError;
use crate::models::game_state::{MoveInput, Side, STARTPOS};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Check classification of a position
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Normal,
    Check,
    Checkmate,
    Stalemate,
}

/// Result of applying a move locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub fen: String,
    pub turn: Side,
    pub from: String,
    pub to: String,
}

/// Maps the `startpos` sentinel (and an empty string) to the real start FEN.
pub fn resolve_fen(fen: &str) -> &str {
    let trimmed = fen.trim();
    if trimmed.is_empty() || trimmed == STARTPOS {
        START_FEN
    } else {
        trimmed
    }
}

pub fn parse_board(fen: &str) -> Result<Board, EngineError> {
    Board::from_str(resolve_fen(fen)).map_err(|_| EngineError::InvalidFen(fen.to_string()))
}

/// Side to move as written in the FEN, without validating the rest.
pub fn side_to_move(fen: &str) -> Side {
    match resolve_fen(fen).split_whitespace().nth(1) {
        Some("b") => Side::Black,
        _ => Side::White,
    }
}

/// Half-move clock field (plies since the last capture or pawn move).
pub fn halfmove_clock(fen: &str) -> Option<u32> {
    resolve_fen(fen).split_whitespace().nth(4)?.parse().ok()
}

fn fullmove_number(fen: &str) -> Option<u32> {
    resolve_fen(fen).split_whitespace().nth(5)?.parse().ok()
}

/// Placement, side to move, castling rights and en passant square: the part
/// of a FEN that decides whether two positions repeat.
pub fn position_key(fen: &str) -> String {
    resolve_fen(fen)
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_square(text: &str) -> Result<Square, EngineError> {
    Square::from_str(&text.trim().to_lowercase())
        .map_err(|_| EngineError::InvalidSquare(text.to_string()))
}

pub fn parse_promotion(text: &str) -> Result<Piece, EngineError> {
    match text.trim().to_lowercase().as_str() {
        "q" | "queen" => Ok(Piece::Queen),
        "r" | "rook" => Ok(Piece::Rook),
        "b" | "bishop" => Ok(Piece::Bishop),
        "n" | "knight" => Ok(Piece::Knight),
        _ => Err(EngineError::InvalidPromotion(text.to_string())),
    }
}

pub fn classify(fen: &str) -> Result<PositionStatus, EngineError> {
    let board = parse_board(fen)?;
    Ok(match board.status() {
        BoardStatus::Checkmate => PositionStatus::Checkmate,
        BoardStatus::Stalemate => PositionStatus::Stalemate,
        BoardStatus::Ongoing if *board.checkers() != EMPTY => PositionStatus::Check,
        BoardStatus::Ongoing => PositionStatus::Normal,
    })
}

pub fn legal_moves(fen: &str) -> Result<Vec<ChessMove>, EngineError> {
    let board = parse_board(fen)?;
    Ok(MoveGen::new_legal(&board).collect())
}

/// Destination squares reachable by the piece on `from`.
pub fn legal_targets(fen: &str, from: &str) -> Result<Vec<String>, EngineError> {
    let source = parse_square(from)?;
    let mut targets: Vec<String> = legal_moves(fen)?
        .into_iter()
        .filter(|m| m.get_source() == source)
        .map(|m| m.get_dest().to_string())
        .collect();
    // promotions list the same square once per piece
    targets.dedup();
    Ok(targets)
}

/// Validates `mv` against `fen` and returns the resulting position.
///
/// The `chess` crate does not track move counters, so they are recomputed
/// here: a pawn move or capture resets the half-move clock, otherwise it
/// counts up from `fen`; the full-move number advances after Black moves.
pub fn apply_move(fen: &str, mv: &MoveInput) -> Result<AppliedMove, EngineError> {
    let board = parse_board(fen)?;
    let source = parse_square(&mv.from)?;
    let dest = parse_square(&mv.to)?;
    let promotion = mv.promotion.as_deref().map(parse_promotion).transpose()?;
    let chess_move = ChessMove::new(source, dest, promotion);

    if !MoveGen::new_legal(&board).any(|m| m == chess_move) {
        return Err(EngineError::IllegalMove {
            from: mv.from.clone(),
            to: mv.to.clone(),
        });
    }

    let resets_clock =
        board.piece_on(source) == Some(Piece::Pawn) || board.piece_on(dest).is_some();
    let halfmove = if resets_clock {
        0
    } else {
        halfmove_clock(fen).unwrap_or(0) + 1
    };
    let fullmove = fullmove_number(fen).unwrap_or(1)
        + u32::from(board.side_to_move() == Color::Black);

    let next = board.make_move_new(chess_move);
    Ok(AppliedMove {
        fen: format!("{} {} {}", position_key(&next.to_string()), halfmove, fullmove),
        turn: next.side_to_move().into(),
        from: source.to_string(),
        to: dest.to_string(),
    })
}

pub fn is_insufficient_material(fen: &str) -> Result<bool, EngineError> {
    Ok(has_insufficient_material(&parse_board(fen)?))
}

/// Neither side can mate: bare kings, a single minor piece, or bishops that
/// all stand on squares of one colour.
pub fn has_insufficient_material(board: &Board) -> bool {
    let mating_material =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if mating_material != EMPTY {
        return false;
    }

    let knights = *board.pieces(Piece::Knight);
    let bishops = *board.pieces(Piece::Bishop);
    if (knights | bishops).popcnt() <= 1 {
        return true;
    }
    if knights != EMPTY {
        return false;
    }

    let mut on_dark = false;
    let mut on_light = false;
    for square in bishops {
        if (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 0 {
            on_dark = true;
        } else {
            on_light = true;
        }
    }
    !(on_dark && on_light)
}
