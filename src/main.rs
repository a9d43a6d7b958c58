use actix::prelude::*;
use clap::Parser;
use futures::channel::mpsc;
use futures::future::{self, Either};
use futures::StreamExt;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use chess_session::config::ClientConfig;
use chess_session::game::clock::format_clock;
use chess_session::models::{GameId, MoveInput};
use chess_session::session::{
    Blur, Close, Focus, GameSession, GetView, Load, SessionEvent, SubmitMove, SubmitOutcome,
};
use chess_session::store::{EnvToken, HttpGameStore, StaticToken, TokenSource};

/// Follow one game from the terminal
#[derive(Parser, Debug)]
#[command(name = "chess-session", version)]
struct Args {
    /// Game to open
    game_id: String,

    /// Move to play once loaded, e.g. e2e4 or a7a8q
    #[arg(long)]
    play: Option<String>,

    /// Stop watching after this many seconds
    #[arg(long, default_value_t = 300)]
    watch_secs: u64,

    /// Bearer token; falls back to CHESS_TOKEN
    #[arg(long)]
    token: Option<String>,
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(2);
        }
    };
    info!("Using API at {}", config.api_base);

    let tokens: Arc<dyn TokenSource> = match args.token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(EnvToken),
    };
    let store = Arc::new(HttpGameStore::from_config(&config, tokens));

    let (tx, mut events) = mpsc::unbounded();
    let session = GameSession::new(GameId::new(args.game_id), store, config.poll)
        .with_events(tx)
        .start();

    match session.send(Load).await {
        Ok(Ok(view)) => {
            if let Some(derived) = &view.derived {
                info!(
                    "Playing as {:?}, my turn: {}",
                    derived.my_side, derived.is_my_turn
                );
            }
        }
        Ok(Err(err)) => {
            error!("Could not load game: {}", err);
            std::process::exit(1);
        }
        Err(err) => {
            error!("Session unavailable: {}", err);
            std::process::exit(1);
        }
    }
    session.do_send(Focus);

    if let Some(text) = args.play.as_deref() {
        match MoveInput::parse(text) {
            Some(mv) => match session.send(SubmitMove(mv)).await {
                Ok(Ok(SubmitOutcome::Confirmed(view))) => {
                    if let Some(state) = &view.state {
                        info!("Move confirmed, position {}", state.fen);
                    }
                }
                Ok(Ok(outcome)) => warn!("Move not sent: {:?}", outcome),
                Ok(Err(err)) => warn!("Move failed: {}", err),
                Err(err) => warn!("Session unavailable: {}", err),
            },
            None => warn!("Cannot read move {:?}", text),
        }
    }

    // Follow the game until it ends or the watch window closes
    let deadline = actix_rt::time::sleep(Duration::from_secs(args.watch_secs));
    futures::pin_mut!(deadline);
    loop {
        match future::select(events.next(), deadline.as_mut()).await {
            Either::Left((Some(event), _)) => {
                if log_event(event) {
                    break;
                }
            }
            Either::Left((None, _)) => break,
            Either::Right(_) => {
                info!("Stopped watching after {}s", args.watch_secs);
                break;
            }
        }
    }

    if let Ok(view) = session.send(GetView).await {
        if let Some(clock) = view.clock {
            info!(
                "Clocks: white {} black {}",
                format_clock(clock.white_ms),
                format_clock(clock.black_ms)
            );
        }
    }
    session.do_send(Blur);
    session.do_send(Close);

    Ok(())
}

/// Logs one session event. Returns true once the game is over.
fn log_event(event: SessionEvent) -> bool {
    match event {
        SessionEvent::StateChanged(state) => {
            info!("{} to move: {}", state.turn, state.fen);
            if let Some(last) = &state.last_move {
                info!("Last move {}{} {}", last.from, last.to, last.san.as_deref().unwrap_or(""));
            }
            false
        }
        SessionEvent::Alert(alert) => {
            warn!("{:?}!", alert);
            false
        }
        SessionEvent::Error(err) => {
            warn!("{}", err);
            false
        }
        SessionEvent::AuthRequired => {
            error!("Sign in required");
            true
        }
        SessionEvent::GameOver(result) => {
            info!("Game over: {:?}", result);
            true
        }
    }
}
