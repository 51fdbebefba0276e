//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section and key is optional; missing values fall back to the
//! defaults of the classic six-horse game.

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::{DerbyError, SpeedPolicy};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub race: RaceConfig,
    pub display: DisplayConfig,
}

/// Bankroll and betting rules.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GameConfig {
    pub starting_balance: f64,
    pub horse_count: u32,
    /// Largest single deposit accepted.
    pub max_deposit: f64,
    /// Winnings multiplier on a correct pick. Defaults to `horse_count`.
    pub payout_multiplier: Option<u32>,
    /// Maximum number of undo steps kept.
    pub history_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_balance: 100.0,
            horse_count: 6,
            max_deposit: 1000.0,
            payout_multiplier: None,
            history_limit: 100,
        }
    }
}

/// Speed assignment and drift parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RaceConfig {
    pub policy: SpeedPolicy,
    pub start_position: f64,
    pub start_speed_min: f64,
    pub start_speed_max: f64,
    /// Per-tick speed perturbation, applied as a uniform draw in `[-d, d]`.
    pub drift_range: f64,
    pub speed_floor: f64,
    pub speed_ceiling: f64,
    /// Speed given to the favourite under the predetermined policy.
    pub favourite_speed: f64,
    /// Fixed RNG seed for reproducible races.
    pub seed: Option<u64>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            policy: SpeedPolicy::Emergent,
            start_position: 0.0,
            start_speed_min: 1.0,
            start_speed_max: 3.0,
            drift_range: 0.2,
            speed_floor: 0.5,
            speed_ceiling: 4.0,
            favourite_speed: 5.0,
            seed: None,
        }
    }
}

/// Settings used only by the terminal driver.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// Finish threshold handed to every tick.
    pub track_length: f64,
    pub tick_rate_hz: u32,
    /// Pause between the winner crossing the line and the next round.
    pub result_pause_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            track_length: 900.0,
            tick_rate_hz: 60,
            result_pause_ms: 2000,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot honour.
    pub fn validate(&self) -> Result<(), DerbyError> {
        let g = &self.game;
        let r = &self.race;
        let d = &self.display;

        if g.horse_count < 2 {
            return Err(config_err(format!("horse_count must be at least 2, got {}", g.horse_count)));
        }
        if !(g.starting_balance >= 0.0) || Decimal::from_f64(g.starting_balance).is_none() {
            return Err(config_err(format!("invalid starting_balance {}", g.starting_balance)));
        }
        if !(g.max_deposit > 0.0) || Decimal::from_f64(g.max_deposit).is_none() {
            return Err(config_err(format!("max_deposit must be positive, got {}", g.max_deposit)));
        }
        if g.payout_multiplier == Some(0) {
            return Err(config_err("payout_multiplier must be positive".into()));
        }
        if g.history_limit == 0 {
            return Err(config_err("history_limit must be positive".into()));
        }

        r.validate()?;

        if d.tick_rate_hz == 0 {
            return Err(config_err("tick_rate_hz must be positive".into()));
        }
        if !(d.track_length > 0.0) {
            return Err(config_err(format!("track_length must be positive, got {}", d.track_length)));
        }
        Ok(())
    }
}

impl RaceConfig {
    /// Check the speed bounds, drift, and start position.
    pub fn validate(&self) -> Result<(), DerbyError> {
        if !(self.speed_floor >= 0.0) {
            return Err(config_err(format!("speed_floor must be non-negative, got {}", self.speed_floor)));
        }
        if !(self.speed_floor <= self.start_speed_min
            && self.start_speed_min <= self.start_speed_max
            && self.start_speed_max <= self.speed_ceiling)
        {
            return Err(config_err(format!(
                "speed bounds must satisfy floor <= start_min <= start_max <= ceiling, got {} <= {} <= {} <= {}",
                self.speed_floor, self.start_speed_min, self.start_speed_max, self.speed_ceiling
            )));
        }
        if !(self.drift_range >= 0.0) {
            return Err(config_err(format!("drift_range must be non-negative, got {}", self.drift_range)));
        }
        if !(self.favourite_speed > self.start_speed_max) {
            return Err(config_err(format!(
                "favourite_speed ({}) must exceed start_speed_max ({})",
                self.favourite_speed, self.start_speed_max
            )));
        }
        if !(self.start_position >= 0.0) {
            return Err(config_err(format!("start_position must be non-negative, got {}", self.start_position)));
        }
        Ok(())
    }
}

impl GameConfig {
    /// Effective payout multiplier: configured value or the horse count.
    pub fn payout_multiplier(&self) -> u32 {
        self.payout_multiplier.unwrap_or(self.horse_count)
    }

    pub fn starting_balance(&self) -> Decimal {
        Decimal::from_f64(self.starting_balance).unwrap_or_default()
    }

    pub fn max_deposit(&self) -> Decimal {
        Decimal::from_f64(self.max_deposit).unwrap_or_default()
    }
}

fn config_err(msg: String) -> DerbyError {
    DerbyError::Config(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.game.horse_count, 6);
        assert_eq!(cfg.game.payout_multiplier(), 6);
        assert_eq!(cfg.game.starting_balance(), dec!(100));
        assert_eq!(cfg.game.max_deposit(), dec!(1000));
        assert_eq!(cfg.race.policy, SpeedPolicy::Emergent);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.game.horse_count, 6);
        assert_eq!(cfg.display.tick_rate_hz, 60);
    }

    #[test]
    fn test_partial_toml() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [game]
            horse_count = 8
            payout_multiplier = 5

            [race]
            policy = "predetermined"
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(cfg.game.horse_count, 8);
        assert_eq!(cfg.game.payout_multiplier(), 5);
        assert_eq!(cfg.game.max_deposit, 1000.0);
        assert_eq!(cfg.race.policy, SpeedPolicy::Predetermined);
        assert_eq!(cfg.race.seed, Some(7));
    }

    #[test]
    fn test_rejects_single_horse() {
        let err = AppConfig::from_toml_str("[game]\nhorse_count = 1\n").unwrap_err();
        assert!(err.to_string().contains("horse_count"));
    }

    #[test]
    fn test_rejects_inverted_speed_bounds() {
        let mut cfg = AppConfig::default();
        cfg.race.start_speed_min = 3.5;
        assert!(matches!(cfg.validate(), Err(DerbyError::Config(_))));
    }

    #[test]
    fn test_rejects_slow_favourite() {
        let mut cfg = AppConfig::default();
        cfg.race.favourite_speed = 3.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_floor() {
        let mut cfg = AppConfig::default();
        cfg.race.speed_floor = -0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(AppConfig::from_toml_str("[race]\npolicy = \"rigged\"\n").is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("derby_test_config_{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[game]\nstarting_balance = 250.0\n").unwrap();

        let cfg = AppConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.game.starting_balance(), dec!(250));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = AppConfig::load_or_default("/tmp/derby_no_such_config_xyz.toml").unwrap();
        assert_eq!(cfg.game.horse_count, 6);
    }
}
