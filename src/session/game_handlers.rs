use actix::prelude::*;
use log::{debug, info, warn};
use std::future::Future;

use super::handler::GameSession;
use super::messages::*;
use super::reconciler::Reconciler;
use crate::error::ClientError;
use crate::models::{GameId, GameState, PendingMove};

type ActionResponse<T> = ResponseActFuture<GameSession, Result<ActionOutcome<T>, ClientError>>;

fn ready<T: 'static>(value: T) -> ResponseActFuture<GameSession, T> {
    Box::pin(actix::fut::ready(value))
}

impl GameSession {
    /// Checks shared by every game action: the game must be loaded and the
    /// action must not already be running.
    fn action_blocked<T>(&self, action: GameAction) -> Option<Result<ActionOutcome<T>, ClientError>> {
        if self.reconciler.is_none() {
            return Some(Err(ClientError::NotLoaded));
        }
        if self.busy.contains(&action) {
            debug!("{:?} already in flight for game {}", action, self.game_id);
            return Some(Ok(ActionOutcome::Busy));
        }
        None
    }

    fn is_active(&self) -> bool {
        self.reconciler.as_ref().is_some_and(|r| r.state().is_active())
    }

    /// Runs `request` under the action's busy flag. On success the session
    /// reloads the game when `reload` is set.
    fn run_action<T, F>(&mut self, action: GameAction, reload: bool, request: F) -> ActionResponse<T>
    where
        T: 'static,
        F: Future<Output = Result<T, ClientError>> + 'static,
    {
        info!("{:?} for game {}", action, self.game_id);
        self.busy.insert(action);

        Box::pin(request.into_actor(self).map(move |res, act, ctx| {
            act.busy.remove(&action);
            match res {
                Ok(value) => {
                    act.last_error = None;
                    if reload {
                        act.reload(ctx);
                    }
                    Ok(ActionOutcome::Done(value))
                }
                Err(err) => {
                    act.fail(err.clone());
                    Err(err)
                }
            }
        }))
    }
}

impl Handler<Load> for GameSession {
    type Result = ResponseActFuture<Self, Result<GameView, ClientError>>;

    fn handle(&mut self, _: Load, _ctx: &mut Self::Context) -> Self::Result {
        info!("Loading game {}", self.game_id);
        self.phase = SessionPhase::Loading;

        // Without a signed-in user there is nothing to load
        let viewer_id = match self.store.viewer_id() {
            Ok(id) => id,
            Err(err) => {
                warn!("Cannot load game {}: {}", self.game_id, err);
                self.phase = SessionPhase::Failed;
                self.last_error = Some(err.clone());
                if err == ClientError::NotAuthenticated {
                    self.emit(SessionEvent::AuthRequired);
                } else {
                    self.emit(SessionEvent::Error(err.clone()));
                }
                return ready(Err(err));
            }
        };

        let store = self.store.clone();
        let game_id = self.game_id.clone();
        Box::pin(
            async move { store.fetch_game(&game_id).await }
                .into_actor(self)
                .map(move |res, act, ctx| {
                    let record = match res {
                        Ok(record) => record,
                        Err(err) => {
                            act.phase = SessionPhase::Failed;
                            if err == ClientError::NotAuthenticated {
                                act.last_error = Some(err.clone());
                                act.emit(SessionEvent::AuthRequired);
                            } else {
                                act.fail(err.clone());
                            }
                            return Err(err);
                        }
                    };

                    let state = GameState::from_record(&record, &act.game_id);
                    info!(
                        "Loaded game {}: {:?}, {} to move",
                        state.id, state.status, state.turn
                    );
                    let (reconciler, alert) = Reconciler::new(state, Some(viewer_id));
                    act.reconciler = Some(reconciler);
                    act.phase = SessionPhase::Ready;
                    act.last_error = None;

                    act.emit_alert(alert);
                    act.after_transition(false, ctx);
                    act.start_polling(ctx);
                    Ok(act.view())
                }),
        )
    }
}

impl Handler<SubmitMove> for GameSession {
    type Result = ResponseActFuture<Self, Result<SubmitOutcome, ClientError>>;

    fn handle(&mut self, msg: SubmitMove, ctx: &mut Self::Context) -> Self::Result {
        // One submission at a time, no queue
        if let Some(pending) = &self.pending_move {
            debug!("Move {} still in flight, ignoring", pending.request_id);
            return ready(Ok(SubmitOutcome::Busy));
        }
        let Some(reconciler) = self.reconciler.as_mut() else {
            return ready(Err(ClientError::NotLoaded));
        };

        // Apply locally first; refusals never reach the network
        let alert = match reconciler.apply_optimistic(&msg.0) {
            Ok(alert) => alert,
            Err(rejection) => {
                debug!("Move {}{} refused: {:?}", msg.0.from, msg.0.to, rejection);
                return ready(Ok(SubmitOutcome::Rejected(rejection)));
            }
        };
        self.emit_alert(alert);
        self.after_transition(false, ctx);

        let pending = PendingMove::new(&msg.0);
        info!(
            "Submitting {}{} for game {} ({})",
            pending.from, pending.to, self.game_id, pending.request_id
        );
        self.pending_move = Some(pending.clone());

        let store = self.store.clone();
        let game_id = self.game_id.clone();
        Box::pin(
            async move { store.submit_move(&game_id, &pending).await }
                .into_actor(self)
                .map(|res, act, ctx| {
                    act.pending_move = None;
                    match res {
                        Ok(record) => {
                            let was_completed = act.is_completed();
                            if let Some(reconciler) = act.reconciler.as_mut() {
                                let alert = reconciler.reconcile_server_response(&record);
                                act.emit_alert(alert);
                            }
                            act.last_error = None;
                            act.after_transition(was_completed, ctx);
                            Ok(SubmitOutcome::Confirmed(Box::new(act.view())))
                        }
                        // the optimistic position stays until the next poll replaces it
                        Err(err) => {
                            if let Some(reconciler) = act.reconciler.as_mut() {
                                reconciler.mark_diverged();
                            }
                            act.fail(err.clone());
                            Err(err)
                        }
                    }
                }),
        )
    }
}

impl Handler<Resign> for GameSession {
    type Result = ActionResponse<()>;

    fn handle(&mut self, _: Resign, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(blocked) = self.action_blocked(GameAction::Resign) {
            return ready(blocked);
        }
        if !self.is_active() {
            return ready(Ok(ActionOutcome::Unavailable));
        }
        let store = self.store.clone();
        let game_id = self.game_id.clone();
        self.run_action(GameAction::Resign, true, async move {
            store.resign(&game_id).await
        })
    }
}

impl Handler<OfferDraw> for GameSession {
    type Result = ActionResponse<()>;

    fn handle(&mut self, _: OfferDraw, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(blocked) = self.action_blocked(GameAction::OfferDraw) {
            return ready(blocked);
        }
        if !self.is_active() {
            return ready(Ok(ActionOutcome::Unavailable));
        }
        let store = self.store.clone();
        let game_id = self.game_id.clone();
        self.run_action(GameAction::OfferDraw, true, async move {
            store.offer_draw(&game_id).await
        })
    }
}

impl Handler<RespondToDraw> for GameSession {
    type Result = ActionResponse<()>;

    fn handle(&mut self, msg: RespondToDraw, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(blocked) = self.action_blocked(GameAction::RespondToDraw) {
            return ready(blocked);
        }
        // Only an offer from the opponent can be answered
        let offered = self
            .reconciler
            .as_ref()
            .is_some_and(|r| r.state().is_active() && r.derived().opponent_offered_draw);
        if !offered {
            return ready(Ok(ActionOutcome::Unavailable));
        }
        let store = self.store.clone();
        let game_id = self.game_id.clone();
        let accept = msg.accept;
        self.run_action(GameAction::RespondToDraw, true, async move {
            store.respond_to_draw(&game_id, accept).await
        })
    }
}

impl Handler<ClaimDraw> for GameSession {
    type Result = ActionResponse<()>;

    fn handle(&mut self, msg: ClaimDraw, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(blocked) = self.action_blocked(GameAction::ClaimDraw) {
            return ready(blocked);
        }
        let reason = msg.0;
        let eligible = self.reconciler.as_ref().is_some_and(|r| {
            r.state().is_active() && r.derived().draw_claims.iter().any(|c| c.reason == reason)
        });
        if !eligible {
            debug!("No {} claim available in game {}", reason, self.game_id);
            return ready(Ok(ActionOutcome::Unavailable));
        }
        let store = self.store.clone();
        let game_id = self.game_id.clone();
        self.run_action(GameAction::ClaimDraw, true, async move {
            store.claim_draw(&game_id, reason).await
        })
    }
}

impl Handler<Rematch> for GameSession {
    type Result = ActionResponse<GameId>;

    fn handle(&mut self, _: Rematch, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(blocked) = self.action_blocked(GameAction::Rematch) {
            return ready(blocked);
        }
        if !self.is_completed() {
            return ready(Ok(ActionOutcome::Unavailable));
        }
        let store = self.store.clone();
        let game_id = self.game_id.clone();
        self.run_action(GameAction::Rematch, false, async move {
            let record = store.rematch(&game_id).await?;
            let id = record
                .id
                .ok_or_else(|| ClientError::Decode("rematch response has no game id".to_string()))?;
            let next = GameId::new(id.to_string());
            info!("Rematch of game {} is game {}", game_id, next);
            Ok(next)
        })
    }
}
