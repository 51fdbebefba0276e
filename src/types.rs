//! Shared types for the DERBY game core.
//!
//! These types form the data model used across all modules.
//! The engine components and the facade depend on them without
//! depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Horse identifier, unique within a race. Horses are numbered `1..=N`.
pub type HorseNumber = u32;

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// A wager tying a horse number to a stake amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub horse_number: HorseNumber,
    pub amount: Decimal,
}

impl Bet {
    pub fn new(horse_number: HorseNumber, amount: Decimal) -> Self {
        Self { horse_number, amount }
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2} on horse #{}", self.amount, self.horse_number)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How horse speeds are assigned when a race is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPolicy {
    /// Independent random speeds that drift every tick. The winner is
    /// whoever crosses the line first.
    #[default]
    Emergent,
    /// One favourite is drawn at setup and given a strictly higher fixed
    /// speed. The outcome is known the moment the race starts.
    Predetermined,
}

impl fmt::Display for SpeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedPolicy::Emergent => write!(f, "emergent"),
            SpeedPolicy::Predetermined => write!(f, "predetermined"),
        }
    }
}

/// Attempt to parse a string into a SpeedPolicy (case-insensitive).
impl std::str::FromStr for SpeedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emergent" | "random" => Ok(SpeedPolicy::Emergent),
            "predetermined" | "fixed" | "favourite" | "favorite" => {
                Ok(SpeedPolicy::Predetermined)
            }
            _ => Err(anyhow::anyhow!("Unknown speed policy: {s}")),
        }
    }
}

/// Race lifecycle: `Idle → Running → Finished → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RaceStatus {
    #[default]
    Idle,
    Running,
    Finished,
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceStatus::Idle => write!(f, "IDLE"),
            RaceStatus::Running => write!(f, "RUNNING"),
            RaceStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Undo history
// ---------------------------------------------------------------------------

/// Snapshot of a bet or balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoEntry {
    /// `closed` is set once the bet has been settled or cancelled. Undo and
    /// redo of a closed entry move it between stacks and change nothing else.
    BetRecorded { bet: Bet, closed: bool },
    /// `before` is the balance prior to the mutation, `after` the balance
    /// it produced.
    BalanceChanged { before: Decimal, after: Decimal },
}

impl fmt::Display for UndoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoEntry::BetRecorded { bet, .. } => write!(f, "bet {bet}"),
            UndoEntry::BalanceChanged { before, after } => {
                write!(f, "balance ${before:.2} → ${after:.2}")
            }
        }
    }
}

impl UndoEntry {
    pub fn bet_placed(bet: Bet) -> Self {
        UndoEntry::BetRecorded { bet, closed: false }
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Outcome of settling one race against the active bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub race_id: Uuid,
    pub winner: HorseNumber,
    pub bet: Bet,
    pub player_won: bool,
    /// Absolute amount of money moved: winnings on a win, the stake on a loss.
    pub payout: Decimal,
    pub balance_after: Decimal,
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    /// Signed balance change caused by this settlement.
    pub fn net(&self) -> Decimal {
        if self.player_won {
            self.payout
        } else {
            -self.payout
        }
    }
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.player_won { "WON" } else { "LOST" };
        write!(
            f,
            "horse #{} wins | {} {verdict} ${:.2} | balance=${:.2}",
            self.winner, self.bet, self.payout, self.balance_after,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for DERBY.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DerbyError {
    #[error("Enter a valid amount (got {amount})")]
    InvalidAmount { amount: Decimal },

    #[error("Not enough money in balance: need ${needed:.2}, have ${available:.2}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Cannot deposit more than ${limit:.2} (got ${amount:.2})")]
    LimitExceeded { amount: Decimal, limit: Decimal },

    #[error("A race is already in progress")]
    RaceInProgress,

    #[error("No horse #{0} in this race")]
    UnknownHorse(HorseNumber),

    #[error("Invalid race state: expected {expected}, was {actual}")]
    InvalidState { expected: RaceStatus, actual: RaceStatus },

    #[error("No active bet to settle")]
    NoActiveBet,

    #[error("Race has no winner yet")]
    NoWinner,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DerbyError {
    /// Errors caused by calling the core out of order rather than by
    /// user input. These are bugs in the caller.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            DerbyError::NoActiveBet | DerbyError::NoWinner | DerbyError::InvalidState { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_settlement(player_won: bool) -> Settlement {
        Settlement {
            race_id: Uuid::new_v4(),
            winner: 3,
            bet: Bet::new(3, dec!(20)),
            player_won,
            payout: dec!(20),
            balance_after: dec!(80),
            settled_at: Utc::now(),
        }
    }

    #[test]
    fn test_bet_display() {
        assert_eq!(Bet::new(4, dec!(12.5)).to_string(), "$12.50 on horse #4");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Emergent".parse::<SpeedPolicy>().unwrap(), SpeedPolicy::Emergent);
        assert_eq!("fixed".parse::<SpeedPolicy>().unwrap(), SpeedPolicy::Predetermined);
        assert!("photo-finish".parse::<SpeedPolicy>().is_err());
    }

    #[test]
    fn test_policy_default_is_emergent() {
        assert_eq!(SpeedPolicy::default(), SpeedPolicy::Emergent);
    }

    #[test]
    fn test_policy_serde_lowercase() {
        let json = serde_json::to_string(&SpeedPolicy::Predetermined).unwrap();
        assert_eq!(json, "\"predetermined\"");
    }

    #[test]
    fn test_race_status_display() {
        assert_eq!(RaceStatus::Idle.to_string(), "IDLE");
        assert_eq!(RaceStatus::Finished.to_string(), "FINISHED");
    }

    #[test]
    fn test_settlement_net_sign() {
        assert_eq!(sample_settlement(true).net(), dec!(20));
        assert_eq!(sample_settlement(false).net(), dec!(-20));
    }

    #[test]
    fn test_settlement_display() {
        let text = sample_settlement(false).to_string();
        assert!(text.contains("horse #3 wins"));
        assert!(text.contains("LOST $20.00"));
    }

    #[test]
    fn test_error_messages() {
        let err = DerbyError::LimitExceeded { amount: dec!(1001), limit: dec!(1000) };
        assert_eq!(err.to_string(), "Cannot deposit more than $1000.00 (got $1001.00)");

        let err = DerbyError::InsufficientBalance { needed: dec!(50), available: dec!(10) };
        assert!(err.to_string().contains("need $50.00"));
    }

    #[test]
    fn test_contract_violations() {
        assert!(DerbyError::NoActiveBet.is_contract_violation());
        assert!(DerbyError::NoWinner.is_contract_violation());
        assert!(!DerbyError::RaceInProgress.is_contract_violation());
        assert!(!DerbyError::InvalidAmount { amount: dec!(0) }.is_contract_violation());
    }
}
