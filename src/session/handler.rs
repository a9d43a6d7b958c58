use actix::prelude::*;
use chrono::Utc;
use futures::channel::mpsc::UnboundedSender;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::messages::*;
use super::reconciler::{Alert, PollMerge, Reconciler};
use crate::config::PollConfig;
use crate::error::ClientError;
use crate::game::clock::live_clock;
use crate::game::engine;
use crate::models::{GameId, GameRecord, PendingMove};
use crate::store::GameStore;

/// Actor owning one game's client-side state
pub struct GameSession {
    pub(super) game_id: GameId,
    pub(super) store: Arc<dyn GameStore>,
    pub(super) poll_config: PollConfig,
    pub(super) phase: SessionPhase,
    pub(super) reconciler: Option<Reconciler>,
    /// The submission in flight; doubles as the busy flag.
    pub(super) pending_move: Option<PendingMove>,
    pub(super) busy: BTreeSet<GameAction>,
    pub(super) live: bool,
    /// Bumped on every focus and blur. Poll results carry the value they
    /// were started with and are dropped when it no longer matches.
    pub(super) poll_generation: u64,
    pub(super) poll_timer: Option<SpawnHandle>,
    pub(super) last_error: Option<ClientError>,
    pub(super) events: Option<UnboundedSender<SessionEvent>>,
}

impl GameSession {
    pub fn new(game_id: GameId, store: Arc<dyn GameStore>, poll_config: PollConfig) -> Self {
        GameSession {
            game_id,
            store,
            poll_config,
            phase: SessionPhase::Loading,
            reconciler: None,
            pending_move: None,
            busy: BTreeSet::new(),
            live: false,
            poll_generation: 0,
            poll_timer: None,
            last_error: None,
            events: None,
        }
    }

    /// Sends session events to `events`.
    pub fn with_events(mut self, events: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub(super) fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            if events.unbounded_send(event).is_err() {
                debug!("Event subscriber for game {} is gone", self.game_id);
            }
        }
    }

    pub(super) fn emit_alert(&self, alert: Option<Alert>) {
        if let Some(alert) = alert {
            info!("Game {}: {:?}", self.game_id, alert);
            self.emit(SessionEvent::Alert(alert));
        }
    }

    pub(super) fn fail(&mut self, err: ClientError) {
        warn!("Game {}: {}", self.game_id, err);
        self.last_error = Some(err.clone());
        self.emit(SessionEvent::Error(err));
    }

    /// Publishes the current state after a transition and stops polling once
    /// the game is over.
    pub(super) fn after_transition(&mut self, was_completed: bool, ctx: &mut Context<Self>) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        let state = reconciler.state().clone();
        self.emit(SessionEvent::StateChanged(Box::new(state.clone())));

        if state.is_completed() && !was_completed {
            info!("Game {} is over: {:?}", self.game_id, state.result);
            self.emit(SessionEvent::GameOver(state.result));
        }
        if !state.is_active() {
            self.cancel_poll(ctx);
        }
    }

    pub(super) fn is_completed(&self) -> bool {
        self.reconciler
            .as_ref()
            .is_some_and(|r| r.state().is_completed())
    }

    pub(super) fn view(&self) -> GameView {
        let state = self.reconciler.as_ref().map(|r| r.state().clone());
        let derived = self.reconciler.as_ref().map(|r| r.derived().clone());
        let clock = state.as_ref().and_then(|s| {
            s.clocks
                .as_ref()
                .filter(|c| c.is_timed())
                .map(|c| live_clock(c, s.turn, Utc::now(), s.is_completed()))
        });

        GameView {
            game_id: self.game_id.clone(),
            phase: self.phase,
            state,
            derived,
            pending_move: self.pending_move.clone(),
            busy: self.busy.iter().copied().collect(),
            clock,
            live: self.live,
            last_error: self.last_error.clone(),
        }
    }

    /// Polls run only while the session is live, the generation is current
    /// and the game is active.
    fn should_poll(&self, generation: u64) -> bool {
        self.live
            && generation == self.poll_generation
            && self.reconciler.as_ref().is_some_and(|r| r.state().is_active())
    }

    pub(super) fn start_polling(&mut self, ctx: &mut Context<Self>) {
        if self.should_poll(self.poll_generation) {
            self.schedule_poll(self.poll_config.initial_delay, ctx);
        }
    }

    fn schedule_poll(&mut self, delay: Duration, ctx: &mut Context<Self>) {
        self.cancel_poll(ctx);
        let generation = self.poll_generation;
        debug!("Next poll of game {} in {:?}", self.game_id, delay);
        self.poll_timer = Some(ctx.run_later(delay, move |act, ctx| {
            act.poll_timer = None;
            act.poll(generation, ctx);
        }));
    }

    fn cancel_poll(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.poll_timer.take() {
            ctx.cancel_future(handle);
        }
    }

    fn poll(&mut self, generation: u64, ctx: &mut Context<Self>) {
        if !self.should_poll(generation) {
            debug!("Skipping poll of game {}", self.game_id);
            return;
        }

        let store = self.store.clone();
        let game_id = self.game_id.clone();
        ctx.spawn(
            async move { store.fetch_game(&game_id).await }
                .into_actor(self)
                .map(move |res, act, ctx| {
                    if !act.should_poll(generation) {
                        debug!("Dropping stale poll result for game {}", act.game_id);
                        return;
                    }
                    match res {
                        Ok(record) => act.merge_poll(&record, ctx),
                        // polling is best effort; the next poll tries again
                        Err(err) => warn!("Poll of game {} failed: {}", act.game_id, err),
                    }
                    if act.should_poll(generation) {
                        act.schedule_poll(act.poll_config.interval, ctx);
                    }
                }),
        );
    }

    fn merge_poll(&mut self, record: &GameRecord, ctx: &mut Context<Self>) {
        let was_completed = self.is_completed();
        let Some(reconciler) = self.reconciler.as_mut() else {
            return;
        };
        match reconciler.reconcile_poll(record) {
            PollMerge::Unchanged => debug!("Game {} unchanged", self.game_id),
            PollMerge::Merged { fen_changed, alert } => {
                info!("Game {} updated (position changed: {})", self.game_id, fen_changed);
                self.emit_alert(alert);
                self.after_transition(was_completed, ctx);
            }
        }
    }

    /// Fetches the authoritative state after an action and adopts it.
    pub(super) fn reload(&mut self, ctx: &mut Context<Self>) {
        let store = self.store.clone();
        let game_id = self.game_id.clone();
        ctx.spawn(
            async move { store.fetch_game(&game_id).await }
                .into_actor(self)
                .map(|res, act, ctx| match res {
                    Ok(record) => {
                        let was_completed = act.is_completed();
                        if let Some(reconciler) = act.reconciler.as_mut() {
                            let alert = reconciler.reconcile_reload(&record);
                            act.emit_alert(alert);
                            act.after_transition(was_completed, ctx);
                        }
                    }
                    Err(err) => act.fail(err),
                }),
        );
    }
}

impl Actor for GameSession {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Session started for game {}", self.game_id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("Session stopped for game {}", self.game_id);
    }
}

impl Handler<Focus> for GameSession {
    type Result = ();

    fn handle(&mut self, _: Focus, ctx: &mut Self::Context) {
        info!("Game {} focused", self.game_id);
        self.live = true;
        self.poll_generation += 1;
        self.start_polling(ctx);
    }
}

impl Handler<Blur> for GameSession {
    type Result = ();

    fn handle(&mut self, _: Blur, ctx: &mut Self::Context) {
        info!("Game {} blurred", self.game_id);
        self.live = false;
        self.poll_generation += 1;
        self.cancel_poll(ctx);
    }
}

impl Handler<Close> for GameSession {
    type Result = ();

    fn handle(&mut self, _: Close, ctx: &mut Self::Context) {
        self.live = false;
        self.poll_generation += 1;
        self.cancel_poll(ctx);
        ctx.stop();
    }
}

impl Handler<GetView> for GameSession {
    type Result = MessageResult<GetView>;

    fn handle(&mut self, _: GetView, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.view())
    }
}

impl Handler<LegalTargets> for GameSession {
    type Result = MessageResult<LegalTargets>;

    fn handle(&mut self, msg: LegalTargets, _ctx: &mut Self::Context) -> Self::Result {
        // only the local player's pieces, and only on their turn
        let targets = match &self.reconciler {
            Some(r) if r.derived().is_my_turn && r.state().is_active() => {
                engine::legal_targets(&r.state().fen, &msg.from).unwrap_or_default()
            }
            _ => Vec::new(),
        };
        MessageResult(targets)
    }
}
