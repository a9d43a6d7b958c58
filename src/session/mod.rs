//! Per-game session: an actor that owns one game's state and keeps it in sync
//! with the remote store.

mod game_handlers;
mod handler;
pub mod messages;
pub mod reconciler;

pub use handler::GameSession;
pub use messages::*;
pub use reconciler::{Alert, Derived, MoveRejection, PollMerge, Reconciler};
