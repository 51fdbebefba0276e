//! Core engine — horses, race stepping, ledger, settlement, and history.

pub mod horse;
pub mod race;
pub mod ledger;
pub mod settlement;
pub mod history;
pub mod stats;

pub use horse::Horse;
pub use history::UndoRedoManager;
pub use ledger::Ledger;
pub use race::RaceEngine;
pub use settlement::BetSettlement;
pub use stats::SessionStats;
