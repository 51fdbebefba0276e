//! Session statistics — running tallies across settled races.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Settlement;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub races_settled: u64,
    pub races_cancelled: u64,
    pub bets_won: u64,
    pub bets_lost: u64,
    pub total_wagered: Decimal,
    pub total_pnl: Decimal,
    pub peak_balance: Decimal,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "races={} (W{}/L{}, cancelled {}) | win_rate={:.1}% | wagered=${:.2} | PnL=${:.2} | peak=${:.2}",
            self.races_settled,
            self.bets_won,
            self.bets_lost,
            self.races_cancelled,
            self.win_rate(),
            self.total_wagered,
            self.total_pnl,
            self.peak_balance,
        )
    }
}

impl SessionStats {
    pub fn new(opening_balance: Decimal) -> Self {
        Self {
            peak_balance: opening_balance,
            ..Default::default()
        }
    }

    /// Win rate as a percentage. Returns 0.0 if nothing has been settled.
    pub fn win_rate(&self) -> f64 {
        if self.races_settled == 0 {
            0.0
        } else {
            (self.bets_won as f64 / self.races_settled as f64) * 100.0
        }
    }

    pub fn record_settlement(&mut self, settlement: &Settlement) {
        self.races_settled += 1;
        if settlement.player_won {
            self.bets_won += 1;
        } else {
            self.bets_lost += 1;
        }
        self.total_wagered = self.total_wagered.saturating_add(settlement.bet.amount);
        self.total_pnl = self.total_pnl.saturating_add(settlement.net());
        self.observe_balance(settlement.balance_after);
    }

    pub fn record_cancellation(&mut self) {
        self.races_cancelled += 1;
    }

    /// Update peak balance if `balance` is higher.
    pub fn observe_balance(&mut self, balance: Decimal) {
        if balance > self.peak_balance {
            self.peak_balance = balance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bet;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn settlement(won: bool, amount: Decimal, payout: Decimal, after: Decimal) -> Settlement {
        Settlement {
            race_id: Uuid::new_v4(),
            winner: 1,
            bet: Bet::new(if won { 1 } else { 2 }, amount),
            player_won: won,
            payout,
            balance_after: after,
            settled_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_stats() {
        let stats = SessionStats::new(dec!(100));
        assert_eq!(stats.peak_balance, dec!(100));
        assert_eq!(stats.win_rate(), 0.0);
    }

    #[test]
    fn test_record_win_and_loss() {
        let mut stats = SessionStats::new(dec!(100));
        stats.record_settlement(&settlement(true, dec!(20), dec!(120), dec!(220)));
        stats.record_settlement(&settlement(false, dec!(10), dec!(10), dec!(210)));

        assert_eq!(stats.races_settled, 2);
        assert_eq!(stats.bets_won, 1);
        assert_eq!(stats.bets_lost, 1);
        assert_eq!(stats.total_wagered, dec!(30));
        assert_eq!(stats.total_pnl, dec!(110));
        assert_eq!(stats.peak_balance, dec!(220));
        assert_eq!(stats.win_rate(), 50.0);
    }

    #[test]
    fn test_cancellations_do_not_count_as_races() {
        let mut stats = SessionStats::new(dec!(100));
        stats.record_cancellation();
        assert_eq!(stats.races_cancelled, 1);
        assert_eq!(stats.races_settled, 0);
    }

    #[test]
    fn test_display() {
        let mut stats = SessionStats::new(dec!(100));
        stats.record_settlement(&settlement(true, dec!(20), dec!(120), dec!(220)));
        let text = stats.to_string();
        assert!(text.contains("W1/L0"));
        assert!(text.contains("peak=$220.00"));
    }
}
