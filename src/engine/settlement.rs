//! Bet settlement — turns a decided race into a balance change.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::history::UndoRedoManager;
use super::ledger::Ledger;
use crate::types::{Bet, DerbyError, HorseNumber, Settlement};

pub struct BetSettlement;

impl BetSettlement {
    /// Settle `bet` against `winner`, mutating the ledger and closing the
    /// bet's history entry.
    ///
    /// A missing bet or winner means the caller got the call order wrong;
    /// the ledger is left untouched in that case.
    pub fn resolve(
        race_id: Uuid,
        bet: Option<&Bet>,
        winner: Option<HorseNumber>,
        multiplier: u32,
        ledger: &mut Ledger,
        history: &mut UndoRedoManager,
    ) -> Result<Settlement, DerbyError> {
        let bet = bet.ok_or(DerbyError::NoActiveBet)?;
        let winner = winner.ok_or(DerbyError::NoWinner)?;

        let player_won = bet.horse_number == winner;
        let payout = ledger.apply_settlement(bet, player_won, multiplier, history)?;
        history.close_bet(bet);

        let settlement = Settlement {
            race_id,
            winner,
            bet: *bet,
            player_won,
            payout,
            balance_after: ledger.balance(),
            settled_at: Utc::now(),
        };

        info!(
            race_id = %race_id,
            winner,
            horse = bet.horse_number,
            player_won,
            payout = format!("${:.2}", payout),
            balance = format!("${:.2}", settlement.balance_after),
            "Race settled"
        );

        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger::DEFAULT_MAX_DEPOSIT;
    use crate::types::UndoEntry;
    use rust_decimal_macros::dec;

    fn make_ledger() -> (Ledger, UndoRedoManager) {
        (Ledger::new(dec!(100), DEFAULT_MAX_DEPOSIT), UndoRedoManager::default())
    }

    #[test]
    fn test_resolve_win() {
        let (mut ledger, mut history) = make_ledger();
        let bet = Bet::new(3, dec!(20));
        let s = BetSettlement::resolve(Uuid::new_v4(), Some(&bet), Some(3), 6, &mut ledger, &mut history)
            .unwrap();

        assert!(s.player_won);
        assert_eq!(s.payout, dec!(120));
        assert_eq!(s.balance_after, dec!(220));
        assert_eq!(ledger.balance(), dec!(220));
    }

    #[test]
    fn test_resolve_loss() {
        let (mut ledger, mut history) = make_ledger();
        let bet = Bet::new(1, dec!(10));
        let s = BetSettlement::resolve(Uuid::new_v4(), Some(&bet), Some(4), 6, &mut ledger, &mut history)
            .unwrap();

        assert!(!s.player_won);
        assert_eq!(s.winner, 4);
        assert_eq!(s.payout, dec!(10));
        assert_eq!(ledger.balance(), dec!(90));
    }

    #[test]
    fn test_custom_multiplier() {
        let (mut ledger, mut history) = make_ledger();
        let bet = Bet::new(2, dec!(10));
        let s = BetSettlement::resolve(Uuid::new_v4(), Some(&bet), Some(2), 3, &mut ledger, &mut history)
            .unwrap();
        assert_eq!(s.payout, dec!(30));
        assert_eq!(ledger.balance(), dec!(130));
    }

    #[test]
    fn test_no_bet() {
        let (mut ledger, mut history) = make_ledger();
        let err = BetSettlement::resolve(Uuid::new_v4(), None, Some(1), 6, &mut ledger, &mut history)
            .unwrap_err();
        assert_eq!(err, DerbyError::NoActiveBet);
        assert!(err.is_contract_violation());
        assert_eq!(ledger.balance(), dec!(100));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_no_winner() {
        let (mut ledger, mut history) = make_ledger();
        let bet = Bet::new(1, dec!(10));
        let err = BetSettlement::resolve(Uuid::new_v4(), Some(&bet), None, 6, &mut ledger, &mut history)
            .unwrap_err();
        assert_eq!(err, DerbyError::NoWinner);
        assert_eq!(ledger.balance(), dec!(100));
    }

    #[test]
    fn test_resolve_closes_bet_entry() {
        let (mut ledger, mut history) = make_ledger();
        let bet = Bet::new(1, dec!(10));
        history.record(UndoEntry::bet_placed(bet));
        BetSettlement::resolve(Uuid::new_v4(), Some(&bet), Some(2), 6, &mut ledger, &mut history)
            .unwrap();

        assert_eq!(
            history.undo(),
            Some(UndoEntry::BalanceChanged { before: dec!(100), after: dec!(90) })
        );
        assert_eq!(history.undo(), Some(UndoEntry::BetRecorded { bet, closed: true }));
    }
}
