//! Single-writer view of one game.
//!
//! Three sources mutate the state: optimistic local moves, move-submission
//! responses and poll snapshots. The server wins every conflict, and
//! `last_seen_fen` only ever holds a FEN the server produced. A poll that
//! still reports the pre-move position while a submission is in flight
//! therefore leaves the optimistic position alone.
//!
//! Poll change detection is plain FEN string inequality. A game that
//! returns to the last server FEN (undo, replay) is not noticed until
//! something else changes.

use serde::Serialize;

use crate::game::draw::{draw_claims, DrawClaimOption};
use crate::game::engine::{self, PositionStatus};
use crate::models::{DrawOfferStatus, GameRecord, GameState, LastMove, MoveInput, Side};

/// One-shot notification for the player
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alert {
    Check,
    Checkmate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AlertLevel {
    #[default]
    None,
    Check,
    Checkmate,
}

/// Why a local move was refused before reaching the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    NotYourTurn,
    GameNotActive,
    Illegal,
}

/// Outcome of merging a poll snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMerge {
    Unchanged,
    Merged { fen_changed: bool, alert: Option<Alert> },
}

/// Facts the UI reads, recomputed on every transition
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Derived {
    pub my_side: Option<Side>,
    pub is_my_turn: bool,
    pub is_game_over: bool,
    pub opponent_id: Option<String>,
    pub position: PositionStatus,
    pub draw_claims: Vec<DrawClaimOption>,
    pub opponent_offered_draw: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    state: GameState,
    derived: Derived,
    viewer_id: Option<String>,
    last_seen_fen: String,
    alert_level: AlertLevel,
    /// Position keys observed in this session, oldest first.
    history: Vec<String>,
    /// Whether the newest history entry is an unconfirmed local move.
    optimistic: bool,
    /// Set when a submission failed: the local position may be one the
    /// server never accepted, so the next poll is adopted whatever it holds.
    diverged: bool,
}

impl Reconciler {
    /// Establishes the baseline from a freshly loaded state.
    ///
    /// Returns the reconciler and the alert for the loaded position, if any.
    pub fn new(state: GameState, viewer_id: Option<String>) -> (Self, Option<Alert>) {
        let last_seen_fen = state.fen.clone();
        let history = vec![engine::position_key(&state.fen)];
        let mut reconciler = Reconciler {
            derived: derive(&state, viewer_id.as_deref(), &history),
            state,
            viewer_id,
            last_seen_fen,
            alert_level: AlertLevel::None,
            history,
            optimistic: false,
            diverged: false,
        };
        let alert = reconciler.observe_alert();
        (reconciler, alert)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn derived(&self) -> &Derived {
        &self.derived
    }

    pub fn last_seen_fen(&self) -> &str {
        &self.last_seen_fen
    }

    pub fn viewer_id(&self) -> Option<&str> {
        self.viewer_id.as_deref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Applies `mv` locally before the server has seen it.
    pub fn apply_optimistic(&mut self, mv: &MoveInput) -> Result<Option<Alert>, MoveRejection> {
        if !self.state.is_active() {
            return Err(MoveRejection::GameNotActive);
        }
        if !self.derived.is_my_turn {
            return Err(MoveRejection::NotYourTurn);
        }
        let applied =
            engine::apply_move(&self.state.fen, mv).map_err(|_| MoveRejection::Illegal)?;

        self.state.fen = applied.fen;
        self.state.turn = applied.turn;
        self.state.last_move = Some(LastMove {
            from: applied.from,
            to: applied.to,
            san: None,
        });
        self.drop_optimistic_entry();
        self.history.push(engine::position_key(&self.state.fen));
        self.optimistic = true;
        Ok(self.transition())
    }

    /// Takes the move-submission response as the new truth.
    pub fn reconcile_server_response(&mut self, record: &GameRecord) -> Option<Alert> {
        self.state.overlay(record);
        self.accept_server_fen()
    }

    /// Replaces the state with an authoritative snapshot, whatever it holds.
    pub fn reconcile_reload(&mut self, record: &GameRecord) -> Option<Alert> {
        self.state.merge_snapshot(record);
        self.accept_server_fen()
    }

    /// The server did not accept the last optimistic move. The next poll
    /// replaces the local position with the server's.
    pub fn mark_diverged(&mut self) {
        self.diverged = true;
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    /// Merges a poll snapshot if its FEN differs from the last server FEN, or
    /// its draw offer, status or result differ from the current state.
    ///
    /// After [`mark_diverged`](Self::mark_diverged) any snapshot carrying a
    /// FEN is adopted.
    pub fn reconcile_poll(&mut self, record: &GameRecord) -> PollMerge {
        if self.diverged {
            if let Some(fen) = record.fen.as_deref() {
                let fen_changed = fen != self.state.fen;
                self.state.merge_snapshot(record);
                let alert = self.accept_server_fen();
                return PollMerge::Merged { fen_changed, alert };
            }
        }

        let fen_changed = record
            .fen
            .as_deref()
            .is_some_and(|fen| fen != self.last_seen_fen);
        let offer_changed = GameState::draw_offer_in(record) != self.state.draw_offer;
        let outcome_changed = record.status.is_some_and(|s| s != self.state.status)
            || (record.status.is_some() && record.result != self.state.result);

        if !fen_changed && !offer_changed && !outcome_changed {
            return PollMerge::Unchanged;
        }

        if fen_changed {
            self.state.merge_snapshot(record);
            let alert = self.accept_server_fen();
            return PollMerge::Merged { fen_changed, alert };
        }

        // Same server position: an unconfirmed local move keeps its place
        let unconfirmed = self.optimistic.then(|| {
            (
                self.state.fen.clone(),
                self.state.turn,
                self.state.last_move.clone(),
            )
        });
        self.state.merge_snapshot(record);
        if let Some((fen, turn, last_move)) = unconfirmed {
            self.state.fen = fen;
            self.state.turn = turn;
            self.state.last_move = last_move;
        }
        PollMerge::Merged {
            fen_changed,
            alert: self.transition(),
        }
    }

    fn accept_server_fen(&mut self) -> Option<Alert> {
        self.last_seen_fen = self.state.fen.clone();
        self.diverged = false;
        self.drop_optimistic_entry();
        let key = engine::position_key(&self.state.fen);
        if self.history.last() != Some(&key) {
            self.history.push(key);
        }
        self.transition()
    }

    fn drop_optimistic_entry(&mut self) {
        if self.optimistic {
            self.history.pop();
            self.optimistic = false;
        }
    }

    fn transition(&mut self) -> Option<Alert> {
        self.derived = derive(&self.state, self.viewer_id.as_deref(), &self.history);
        self.observe_alert()
    }

    /// Fires only when the level changes; dropping back to `None` is silent.
    fn observe_alert(&mut self) -> Option<Alert> {
        let level = match self.derived.position {
            PositionStatus::Checkmate => AlertLevel::Checkmate,
            PositionStatus::Check => AlertLevel::Check,
            PositionStatus::Normal | PositionStatus::Stalemate => AlertLevel::None,
        };
        if level == self.alert_level {
            return None;
        }
        self.alert_level = level;
        match level {
            AlertLevel::Checkmate => Some(Alert::Checkmate),
            AlertLevel::Check => Some(Alert::Check),
            AlertLevel::None => None,
        }
    }
}

fn derive(state: &GameState, viewer_id: Option<&str>, history: &[String]) -> Derived {
    let my_side = viewer_id.and_then(|id| state.side_of(id));
    let is_game_over = state.is_completed();
    let opponent_id = my_side.and_then(|side| state.player_id(side.opposite()).map(str::to_string));
    let opponent_offered_draw = match (&state.draw_offer, &opponent_id) {
        (Some(offer), Some(opponent)) => {
            offer.status == DrawOfferStatus::Pending && offer.by.as_deref() == Some(opponent.as_str())
        }
        _ => false,
    };

    Derived {
        my_side,
        is_my_turn: my_side == Some(state.turn),
        is_game_over,
        opponent_id,
        position: engine::classify(&state.fen).unwrap_or(PositionStatus::Normal),
        draw_claims: if is_game_over {
            Vec::new()
        } else {
            draw_claims(&state.fen, history)
        },
        opponent_offered_draw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::draw::DrawClaimReason;
    use crate::game::engine::START_FEN;
    use crate::models::{GameId, GameStatus, WireId};

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
    const CHECK: &str = "4k3/8/8/8/8/8/8/4R2K b - - 0 1";
    const CHECK_AGAIN: &str = "4k3/8/8/8/8/8/8/4R2K b - - 2 2";
    const MATE: &str = "R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1";

    fn record(fen: &str) -> GameRecord {
        GameRecord {
            id: Some(WireId::Number(1)),
            fen: Some(fen.to_string()),
            status: Some(GameStatus::Active),
            white_user_id: Some(WireId::Number(10)),
            black_user_id: Some(WireId::Number(20)),
            ..GameRecord::default()
        }
    }

    fn loaded(fen: &str, viewer: &str) -> Reconciler {
        let state = GameState::from_record(&record(fen), &GameId::new("1"));
        Reconciler::new(state, Some(viewer.to_string())).0
    }

    #[test]
    fn optimistic_e4_then_server_wins() {
        let mut rec = loaded(START_FEN, "10");
        assert!(rec.derived().is_my_turn);

        rec.apply_optimistic(&MoveInput::new("e2", "e4")).unwrap();
        assert_eq!(rec.state().fen, AFTER_E4);
        assert_eq!(rec.state().turn, Side::Black);
        assert_eq!(rec.last_seen_fen(), START_FEN);
        assert!(!rec.derived().is_my_turn);

        // the server altered the move
        let server_fen = "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq - 0 1";
        rec.reconcile_server_response(&GameRecord {
            fen: Some(server_fen.to_string()),
            turn: Some(Side::Black),
            status: Some(GameStatus::Active),
            ..GameRecord::default()
        });
        assert_eq!(rec.state().fen, server_fen);
        assert_eq!(rec.state().turn, Side::Black);
        assert_eq!(rec.state().status, GameStatus::Active);
        assert_eq!(rec.last_seen_fen(), server_fen);
        assert_eq!(rec.history().len(), 2);
    }

    #[test]
    fn optimistic_refusals_leave_state_alone() {
        let mut rec = loaded(START_FEN, "20");
        assert_eq!(
            rec.apply_optimistic(&MoveInput::new("e7", "e5")),
            Err(MoveRejection::NotYourTurn)
        );

        let mut rec = loaded(START_FEN, "10");
        let before = rec.state().clone();
        assert_eq!(
            rec.apply_optimistic(&MoveInput::new("e2", "e5")),
            Err(MoveRejection::Illegal)
        );
        assert_eq!(rec.state(), &before);

        let mut finished = record(START_FEN);
        finished.status = Some(GameStatus::Completed);
        let state = GameState::from_record(&finished, &GameId::new("1"));
        let (mut rec, _) = Reconciler::new(state, Some("10".to_string()));
        assert_eq!(
            rec.apply_optimistic(&MoveInput::new("e2", "e4")),
            Err(MoveRejection::GameNotActive)
        );
    }

    #[test]
    fn poll_with_same_fen_is_a_no_op() {
        let mut rec = loaded(START_FEN, "10");
        let snapshot = record(AFTER_E4);
        assert!(matches!(rec.reconcile_poll(&snapshot), PollMerge::Merged { fen_changed: true, .. }));
        let before = rec.state().clone();
        let derived = rec.derived().clone();
        assert_eq!(rec.reconcile_poll(&snapshot), PollMerge::Unchanged);
        assert_eq!(rec.state(), &before);
        assert_eq!(rec.derived(), &derived);
    }

    #[test]
    fn poll_of_pre_move_fen_keeps_optimistic_position() {
        let mut rec = loaded(START_FEN, "10");
        rec.apply_optimistic(&MoveInput::new("e2", "e4")).unwrap();
        assert_eq!(rec.reconcile_poll(&record(START_FEN)), PollMerge::Unchanged);
        assert_eq!(rec.state().fen, AFTER_E4);
    }

    #[test]
    fn draw_offer_change_without_move_is_merged() {
        let mut rec = loaded(START_FEN, "10");
        let mut snapshot = record(START_FEN);
        snapshot.draw_offer_status = Some(DrawOfferStatus::Pending);
        snapshot.draw_offer_by = Some(WireId::Number(20));
        snapshot.draw_offer_at = Some("2026-02-01T00:00:00Z".to_string());

        assert_eq!(
            rec.reconcile_poll(&snapshot),
            PollMerge::Merged { fen_changed: false, alert: None }
        );
        assert!(rec.derived().opponent_offered_draw);
        assert_eq!(rec.reconcile_poll(&snapshot), PollMerge::Unchanged);

        // offer withdrawn: fields come back empty
        assert!(matches!(rec.reconcile_poll(&record(START_FEN)), PollMerge::Merged { .. }));
        assert_eq!(rec.state().draw_offer, None);
        assert!(!rec.derived().opponent_offered_draw);
    }

    #[test]
    fn resignation_without_move_is_merged() {
        let mut rec = loaded(START_FEN, "10");
        let mut snapshot = record(START_FEN);
        snapshot.status = Some(GameStatus::Completed);
        snapshot.result = Some(crate::models::GameResult::White);
        assert!(matches!(rec.reconcile_poll(&snapshot), PollMerge::Merged { .. }));
        assert!(rec.derived().is_game_over);
        assert!(rec.derived().draw_claims.is_empty());
    }

    #[test]
    fn alerts_fire_on_transitions_only() {
        let mut rec = loaded(START_FEN, "10");
        let alerts: Vec<Alert> = [CHECK, CHECK_AGAIN, MATE]
            .iter()
            .filter_map(|fen| match rec.reconcile_poll(&record(fen)) {
                PollMerge::Merged { alert, .. } => alert,
                PollMerge::Unchanged => None,
            })
            .collect();
        assert_eq!(alerts, vec![Alert::Check, Alert::Checkmate]);
        assert_eq!(rec.derived().position, PositionStatus::Checkmate);
    }

    #[test]
    fn leaving_check_is_silent_and_rearms() {
        let mut rec = loaded(CHECK, "10");
        let merged = rec.reconcile_poll(&record("3k4/8/8/8/8/8/8/4R2K w - - 1 2"));
        assert_eq!(merged, PollMerge::Merged { fen_changed: true, alert: None });
        let merged = rec.reconcile_poll(&record(CHECK_AGAIN));
        assert_eq!(merged, PollMerge::Merged { fen_changed: true, alert: Some(Alert::Check) });
    }

    #[test]
    fn loading_into_check_alerts_once() {
        let state = GameState::from_record(&record(CHECK), &GameId::new("1"));
        let (_, alert) = Reconciler::new(state, Some("20".to_string()));
        assert_eq!(alert, Some(Alert::Check));
    }

    #[test]
    fn threefold_from_observed_positions() {
        let mut rec = loaded(START_FEN, "10");
        let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
        let mut fen = START_FEN.to_string();
        for _ in 0..2 {
            for (from, to) in shuffle {
                fen = engine::apply_move(&fen, &MoveInput::new(from, to)).unwrap().fen;
                rec.reconcile_poll(&record(&fen));
            }
        }
        let reasons: Vec<_> = rec.derived().draw_claims.iter().map(|c| c.reason).collect();
        assert_eq!(reasons, vec![DrawClaimReason::Threefold]);
    }

    #[test]
    fn rejected_submission_is_undone_by_the_next_poll() {
        let mut rec = loaded(START_FEN, "10");
        rec.apply_optimistic(&MoveInput::new("e2", "e4")).unwrap();
        rec.mark_diverged();

        // the server still holds the pre-move position
        assert_eq!(
            rec.reconcile_poll(&record(START_FEN)),
            PollMerge::Merged { fen_changed: true, alert: None }
        );
        assert_eq!(rec.state().fen, START_FEN);
        assert_eq!(rec.state().turn, Side::White);
        assert!(rec.derived().is_my_turn);
        assert!(!rec.is_diverged());
        assert_eq!(rec.history(), &[engine::position_key(START_FEN)]);

        assert_eq!(rec.reconcile_poll(&record(START_FEN)), PollMerge::Unchanged);
        assert!(rec.apply_optimistic(&MoveInput::new("e2", "e4")).is_ok());
    }

    #[test]
    fn draw_offer_during_submission_keeps_local_move() {
        let mut rec = loaded(START_FEN, "10");
        rec.apply_optimistic(&MoveInput::new("e2", "e4")).unwrap();

        let mut snapshot = record(START_FEN);
        snapshot.draw_offer_status = Some(DrawOfferStatus::Pending);
        snapshot.draw_offer_by = Some(WireId::Number(20));
        assert_eq!(
            rec.reconcile_poll(&snapshot),
            PollMerge::Merged { fen_changed: false, alert: None }
        );
        assert_eq!(rec.state().fen, AFTER_E4);
        assert_eq!(rec.state().turn, Side::Black);
        assert!(rec.derived().opponent_offered_draw);
        assert_eq!(rec.history().len(), 2);

        rec.reconcile_server_response(&record(AFTER_E4));
        assert_eq!(
            rec.history(),
            &[engine::position_key(START_FEN), engine::position_key(AFTER_E4)]
        );
    }

    #[test]
    fn opponent_and_turn_for_black() {
        let rec = loaded(AFTER_E4, "20");
        assert_eq!(rec.derived().my_side, Some(Side::Black));
        assert_eq!(rec.derived().opponent_id.as_deref(), Some("10"));
        assert!(rec.derived().is_my_turn);

        let spectator = loaded(AFTER_E4, "99");
        assert_eq!(spectator.derived().my_side, None);
        assert!(!spectator.derived().is_my_turn);
    }
}
