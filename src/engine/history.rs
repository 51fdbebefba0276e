//! Undo/redo history for bet and balance mutations.
//!
//! The manager only tracks entries. Applying the inverse effect of an
//! undone entry is the caller's job.

use std::collections::VecDeque;
use tracing::debug;

use crate::types::{Bet, UndoEntry};

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct UndoRedoManager {
    undo_stack: VecDeque<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
    limit: usize,
}

impl Default for UndoRedoManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl UndoRedoManager {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record a new action. Clears the redo stack and drops the oldest
    /// entry once the limit is exceeded.
    pub fn record(&mut self, entry: UndoEntry) {
        self.undo_stack.push_back(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.limit {
            let dropped = self.undo_stack.pop_front();
            debug!(?dropped, limit = self.limit, "Undo history full, dropped oldest entry");
        }
    }

    pub fn undo(&mut self) -> Option<UndoEntry> {
        let entry = self.undo_stack.pop_back()?;
        self.redo_stack.push(entry);
        Some(entry)
    }

    pub fn redo(&mut self) -> Option<UndoEntry> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push_back(entry);
        Some(entry)
    }

    /// The entry `undo` would return, without moving it.
    pub fn peek_undo(&self) -> Option<&UndoEntry> {
        self.undo_stack.back()
    }

    /// The entry `redo` would return, without moving it.
    pub fn peek_redo(&self) -> Option<&UndoEntry> {
        self.redo_stack.last()
    }

    /// Flag the open entry for `bet` as closed after the bet is settled or
    /// cancelled. Returns `false` if the entry already fell off the history.
    pub fn close_bet(&mut self, bet: &Bet) -> bool {
        let open = self.undo_stack.iter_mut().rev().find_map(|entry| match entry {
            UndoEntry::BetRecorded { bet: recorded, closed } if *recorded == *bet && !*closed => {
                Some(closed)
            }
            _ => None,
        });
        match open {
            Some(closed) => {
                *closed = true;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(before: i64, after: i64) -> UndoEntry {
        UndoEntry::BalanceChanged {
            before: before.into(),
            after: after.into(),
        }
    }

    #[test]
    fn test_empty_stacks_return_none() {
        let mut history = UndoRedoManager::default();
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), None);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_lifo() {
        let mut history = UndoRedoManager::default();
        history.record(balance(100, 150));
        history.record(UndoEntry::bet_placed(Bet::new(2, dec!(10))));

        assert_eq!(history.undo(), Some(UndoEntry::bet_placed(Bet::new(2, dec!(10)))));
        assert_eq!(history.undo(), Some(balance(100, 150)));
        assert_eq!(history.undo(), None);

        assert_eq!(history.redo(), Some(balance(100, 150)));
        assert_eq!(history.redo(), Some(UndoEntry::bet_placed(Bet::new(2, dec!(10)))));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = UndoRedoManager::default();
        history.record(balance(0, 10));
        history.undo();
        assert!(history.can_redo());

        history.record(balance(0, 20));
        assert!(!history.can_redo());
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = UndoRedoManager::new(2);
        history.record(balance(0, 1));
        history.record(balance(1, 2));
        history.record(balance(2, 3));

        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.undo(), Some(balance(2, 3)));
        assert_eq!(history.undo(), Some(balance(1, 2)));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn test_peek_does_not_move() {
        let mut history = UndoRedoManager::default();
        history.record(balance(5, 6));
        assert_eq!(history.peek_undo(), Some(&balance(5, 6)));
        assert_eq!(history.undo_len(), 1);

        history.undo();
        assert_eq!(history.peek_redo(), Some(&balance(5, 6)));
        assert_eq!(history.redo_len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = UndoRedoManager::default();
        history.record(balance(0, 1));
        history.record(balance(1, 2));
        history.undo();
        history.clear();
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_close_bet_marks_latest_open_entry() {
        let mut history = UndoRedoManager::default();
        let bet = Bet::new(1, dec!(5));
        history.record(UndoEntry::bet_placed(bet));
        history.record(balance(100, 95));
        history.record(UndoEntry::bet_placed(bet));

        assert!(history.close_bet(&bet));
        assert_eq!(history.peek_undo(), Some(&UndoEntry::BetRecorded { bet, closed: true }));
        assert!(history.close_bet(&bet));
        assert!(!history.close_bet(&bet));

        history.undo();
        history.undo();
        assert_eq!(history.peek_undo(), Some(&UndoEntry::BetRecorded { bet, closed: true }));
    }

    #[test]
    fn test_close_bet_after_entry_dropped() {
        let mut history = UndoRedoManager::new(1);
        let bet = Bet::new(2, dec!(10));
        history.record(UndoEntry::bet_placed(bet));
        history.record(balance(100, 150));
        assert!(!history.close_bet(&bet));
        assert_eq!(history.peek_undo(), Some(&balance(100, 150)));
    }
}
