//! Client-side game synchronisation for a turn-based online chess platform.
//!
//! A [`session::GameSession`] actor owns one game. It applies the local
//! player's moves optimistically, submits them to the [`store::GameStore`]
//! one at a time, and polls for the opponent's moves while focused.

pub mod config;
pub mod error;
pub mod game;
pub mod models;
pub mod session;
pub mod store;
