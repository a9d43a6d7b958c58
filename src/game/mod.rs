pub mod clock;
pub mod draw;
pub mod engine;
