//! DERBY — horse race betting game core
//!
//! Library crate exposing the race engine, ledger, settlement, and undo
//! history behind the `GameState` facade, for use by the terminal driver,
//! integration tests, and any other presentation layer.

pub mod config;
pub mod types;
pub mod engine;
pub mod game;

pub use game::{GameEvent, GameObserver, GameState};
