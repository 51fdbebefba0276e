//! Ledger — the player's balance.
//!
//! Every balance mutation goes through `deposit` or `apply_settlement`,
//! and each one records its undo entry in the same call.

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::history::UndoRedoManager;
use crate::types::{Bet, DerbyError, UndoEntry};

/// Default cap on a single deposit.
pub const DEFAULT_MAX_DEPOSIT: Decimal = Decimal::ONE_THOUSAND;

#[derive(Debug, Clone)]
pub struct Ledger {
    balance: Decimal,
    max_deposit: Decimal,
}

impl Ledger {
    pub fn new(balance: Decimal, max_deposit: Decimal) -> Self {
        Self {
            balance: balance.max(Decimal::ZERO),
            max_deposit,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn max_deposit(&self) -> Decimal {
        self.max_deposit
    }

    /// Whether a stake of `amount` can be placed right now.
    pub fn can_afford(&self, amount: Decimal) -> bool {
        amount > Decimal::ZERO && amount <= self.balance
    }

    /// Add funds, bounded by the single-deposit cap.
    pub fn deposit(
        &mut self,
        amount: Decimal,
        history: &mut UndoRedoManager,
    ) -> Result<(), DerbyError> {
        if amount <= Decimal::ZERO {
            warn!(%amount, "Deposit rejected: non-positive amount");
            return Err(DerbyError::InvalidAmount { amount });
        }
        if amount > self.max_deposit {
            warn!(%amount, limit = %self.max_deposit, "Deposit rejected: over limit");
            return Err(DerbyError::LimitExceeded {
                amount,
                limit: self.max_deposit,
            });
        }

        let before = self.balance;
        self.balance = self.credit(amount)?;
        history.record(UndoEntry::BalanceChanged {
            before,
            after: self.balance,
        });

        info!(
            amount = format!("${:.2}", amount),
            balance = format!("${:.2}", self.balance),
            "Deposit accepted"
        );
        Ok(())
    }

    /// Settle a bet: credit `amount × multiplier` on a win, debit the stake
    /// on a loss. Returns the absolute amount moved.
    pub fn apply_settlement(
        &mut self,
        bet: &Bet,
        won: bool,
        multiplier: u32,
        history: &mut UndoRedoManager,
    ) -> Result<Decimal, DerbyError> {
        let before = self.balance;
        let payout = if won {
            let payout = bet
                .amount
                .checked_mul(Decimal::from(multiplier))
                .ok_or_else(|| self.overflow(bet.amount))?;
            self.balance = self.credit(payout)?;
            payout
        } else {
            if bet.amount > self.balance {
                return Err(DerbyError::InsufficientBalance {
                    needed: bet.amount,
                    available: self.balance,
                });
            }
            self.balance -= bet.amount;
            bet.amount
        };

        history.record(UndoEntry::BalanceChanged {
            before,
            after: self.balance,
        });
        Ok(payout)
    }

    /// Balance after adding `amount`, or `LimitExceeded` if it does not fit.
    fn credit(&self, amount: Decimal) -> Result<Decimal, DerbyError> {
        self.balance.checked_add(amount).ok_or_else(|| self.overflow(amount))
    }

    fn overflow(&self, amount: Decimal) -> DerbyError {
        warn!(%amount, balance = %self.balance, "Balance would overflow");
        DerbyError::LimitExceeded {
            amount,
            limit: Decimal::MAX - self.balance,
        }
    }

    /// Set the balance from an undo/redo snapshot.
    pub(crate) fn restore(&mut self, balance: Decimal) {
        self.balance = balance;
    }
}
