//! Shared helpers for integration testing.
//!
//! Provides an in-memory `GameObserver` that records every event, and
//! config builders for deterministic sessions.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use derby::config::AppConfig;
use derby::types::SpeedPolicy;
use derby::{GameEvent, GameObserver};

pub const FINISH: f64 = 900.0;

/// Records events so tests can inspect them after the fact.
///
/// Clones share the same log, so keep one clone and subscribe the other.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<GameEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl GameObserver for RecordingObserver {
    fn on_event(&mut self, event: &GameEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Default config with a fixed seed.
pub fn seeded_config(seed: u64) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.race.seed = Some(seed);
    cfg
}

pub fn seeded_config_with(seed: u64, horse_count: u32, policy: SpeedPolicy) -> AppConfig {
    let mut cfg = seeded_config(seed);
    cfg.game.horse_count = horse_count;
    cfg.race.policy = policy;
    cfg
}
