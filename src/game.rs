//! Game facade — the single entry point for the presentation layer.
//!
//! Composes the race engine, ledger, settlement, and undo history, and
//! publishes a [`GameEvent`] to every registered observer after each
//! state transition. Presentation renders from events or polled state;
//! the core never reaches into it.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::engine::{BetSettlement, Horse, Ledger, RaceEngine, SessionStats, UndoRedoManager};
use crate::types::{Bet, DerbyError, HorseNumber, RaceStatus, Settlement, SpeedPolicy, UndoEntry};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notifications published to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    BetPlaced(Bet),
    /// A pending bet was dropped without settlement (reset or undo).
    BetCleared(Bet),
    RaceStarted { race_id: Uuid, policy: SpeedPolicy },
    Ticked { tick: u64, positions: Vec<(HorseNumber, f64)> },
    WinnerDecided { race_id: Uuid, winner: HorseNumber },
    Settled(Settlement),
    BalanceChanged { before: Decimal, after: Decimal },
    RaceReset { cancelled: bool },
}

/// Presentation-side hook. Sounds, popups, and labels live behind this.
#[cfg_attr(test, mockall::automock)]
pub trait GameObserver {
    fn on_event(&mut self, event: &GameEvent);
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

pub struct GameState {
    engine: RaceEngine,
    ledger: Ledger,
    history: UndoRedoManager,
    stats: SessionStats,
    bet: Option<Bet>,
    /// Settlement of the current race; `Some` means already resolved.
    settlement: Option<Settlement>,
    settlements: Vec<Settlement>,
    policy: SpeedPolicy,
    start_position: f64,
    payout_multiplier: u32,
    observers: Vec<Box<dyn GameObserver>>,
}

impl GameState {
    /// Build a fresh session from validated configuration.
    pub fn new(config: &AppConfig) -> Result<Self, DerbyError> {
        config.validate()?;
        let opening = config.game.starting_balance();
        Ok(Self {
            engine: RaceEngine::new(config.game.horse_count, config.race.clone())?,
            ledger: Ledger::new(opening, config.game.max_deposit()),
            history: UndoRedoManager::new(config.game.history_limit),
            stats: SessionStats::new(opening),
            bet: None,
            settlement: None,
            settlements: Vec::new(),
            policy: config.race.policy,
            start_position: config.race.start_position,
            payout_multiplier: config.game.payout_multiplier(),
            observers: Vec::new(),
        })
    }

    /// Register an observer for all subsequent events.
    pub fn subscribe(&mut self, observer: Box<dyn GameObserver>) {
        self.observers.push(observer);
    }

    fn emit(&mut self, event: GameEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }

    // -- Read side --------------------------------------------------------

    pub fn balance(&self) -> Decimal {
        self.ledger.balance()
    }

    pub fn bet(&self) -> Option<&Bet> {
        self.bet.as_ref()
    }

    pub fn winner(&self) -> Option<HorseNumber> {
        self.engine.winner()
    }

    pub fn status(&self) -> RaceStatus {
        self.engine.status()
    }

    pub fn positions(&self) -> Vec<(HorseNumber, f64)> {
        self.engine.positions()
    }

    pub fn horses(&self) -> &[Horse] {
        self.engine.horses()
    }

    pub fn horse_count(&self) -> u32 {
        self.engine.horse_count()
    }

    pub fn race_id(&self) -> Uuid {
        self.engine.race_id()
    }

    /// Settlement of the current race, if it has been resolved.
    pub fn last_settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    /// Every settlement of this session, oldest first.
    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn payout_multiplier(&self) -> u32 {
        self.payout_multiplier
    }

    pub fn max_deposit(&self) -> Decimal {
        self.ledger.max_deposit()
    }

    pub fn policy(&self) -> SpeedPolicy {
        self.policy
    }

    /// Pre-selected winner of the current race under the predetermined
    /// policy. Always `None` for emergent races.
    pub fn favourite(&self) -> Option<HorseNumber> {
        self.engine.favourite()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // -- Betting ----------------------------------------------------------

    /// Reserve a stake on a horse. The balance is not debited until the
    /// race is settled.
    pub fn place_bet(&mut self, horse_number: HorseNumber, amount: Decimal) -> Result<(), DerbyError> {
        if self.bet.is_some() || self.engine.status() != RaceStatus::Idle {
            warn!(horse = horse_number, %amount, "Bet rejected: race in progress");
            return Err(DerbyError::RaceInProgress);
        }
        if amount <= Decimal::ZERO {
            warn!(horse = horse_number, %amount, "Bet rejected: invalid amount");
            return Err(DerbyError::InvalidAmount { amount });
        }
        if !self.engine.has_horse(horse_number) {
            warn!(horse = horse_number, "Bet rejected: unknown horse");
            return Err(DerbyError::UnknownHorse(horse_number));
        }
        if !self.ledger.can_afford(amount) {
            warn!(
                horse = horse_number,
                %amount,
                balance = %self.ledger.balance(),
                "Bet rejected: insufficient balance"
            );
            return Err(DerbyError::InsufficientBalance {
                needed: amount,
                available: self.ledger.balance(),
            });
        }

        let bet = Bet::new(horse_number, amount);
        self.bet = Some(bet);
        self.history.record(UndoEntry::bet_placed(bet));
        info!(horse = horse_number, amount = format!("${:.2}", amount), "Bet placed");
        self.emit(GameEvent::BetPlaced(bet));
        Ok(())
    }

    /// Choose the speed policy for the next race.
    pub fn set_policy(&mut self, policy: SpeedPolicy) -> Result<(), DerbyError> {
        if self.engine.status() != RaceStatus::Idle {
            return Err(DerbyError::RaceInProgress);
        }
        self.policy = policy;
        debug!(%policy, "Speed policy changed");
        Ok(())
    }

    // -- Race -------------------------------------------------------------

    /// Start the race from the configured start position.
    pub fn setup_race(&mut self) -> Result<(), DerbyError> {
        self.ensure_bet()?;
        self.engine.setup(self.start_position, self.policy)?;
        self.race_started();
        Ok(())
    }

    /// Start the race with horses left where presentation placed them.
    pub fn setup_race_speeds(&mut self) -> Result<(), DerbyError> {
        self.ensure_bet()?;
        self.engine.setup_speeds(self.policy)?;
        self.race_started();
        Ok(())
    }

    /// Move a horse to its on-screen start position before the race.
    pub fn place_horse(&mut self, number: HorseNumber, position: f64) -> Result<(), DerbyError> {
        self.engine.place_horse(number, position)
    }

    fn ensure_bet(&self) -> Result<(), DerbyError> {
        if self.bet.is_none() {
            return Err(DerbyError::NoActiveBet);
        }
        Ok(())
    }

    fn race_started(&mut self) {
        self.settlement = None;
        let race_id = self.engine.race_id();
        let policy = self.engine.policy();
        self.emit(GameEvent::RaceStarted { race_id, policy });
    }

    /// Advance the simulation by one frame.
    ///
    /// Returns the winner on the tick it is decided. Ticks after the
    /// finish are ignored until [`reset`](Self::reset).
    pub fn tick(&mut self, finish_threshold: f64) -> Result<Option<HorseNumber>, DerbyError> {
        let was_running = self.engine.status() == RaceStatus::Running;
        let winner = self.engine.step(finish_threshold)?;

        if was_running {
            let tick = self.engine.ticks();
            let positions = self.engine.positions();
            self.emit(GameEvent::Ticked { tick, positions });
        }
        if let Some(winner) = winner {
            let race_id = self.engine.race_id();
            self.emit(GameEvent::WinnerDecided { race_id, winner });
        }
        Ok(winner)
    }

    /// Settle the finished race against the active bet.
    ///
    /// Idempotent: a second call returns the same settlement without
    /// touching the ledger again. Calling before a winner exists, or with
    /// no bet, is a caller bug: it asserts in debug builds and is a logged
    /// no-op in release builds.
    pub fn resolve_race(&mut self) -> Result<Option<Settlement>, DerbyError> {
        if let Some(settled) = &self.settlement {
            debug!(race_id = %settled.race_id, "Race already resolved");
            return Ok(Some(settled.clone()));
        }

        let winner = self.engine.winner();
        debug_assert!(
            self.bet.is_some() && winner.is_some(),
            "resolve_race called before a winner or without a bet"
        );
        if self.bet.is_none() || winner.is_none() {
            warn!(
                has_bet = self.bet.is_some(),
                has_winner = winner.is_some(),
                "resolve_race called out of order, ignoring"
            );
            return Ok(None);
        }

        let before = self.ledger.balance();
        let settlement = BetSettlement::resolve(
            self.engine.race_id(),
            self.bet.as_ref(),
            winner,
            self.payout_multiplier,
            &mut self.ledger,
            &mut self.history,
        )?;

        self.stats.record_settlement(&settlement);
        self.settlements.push(settlement.clone());
        self.settlement = Some(settlement.clone());

        self.emit(GameEvent::Settled(settlement.clone()));
        self.emit(GameEvent::BalanceChanged {
            before,
            after: settlement.balance_after,
        });
        Ok(Some(settlement))
    }

    /// Clear the bet, winner, and horses for the next round.
    ///
    /// A finished race is settled first if it has not been already.
    /// Resetting mid-race cancels it: the ledger is untouched and the bet
    /// is dropped.
    pub fn reset(&mut self) {
        let unsettled = self.settlement.is_none() && self.bet.is_some();
        if self.engine.status() == RaceStatus::Finished && unsettled {
            if let Err(e) = self.resolve_race() {
                warn!(error = %e, race_id = %self.engine.race_id(), "Settlement on reset failed");
            }
        }

        let cancelled = self.engine.status() != RaceStatus::Idle && self.settlement.is_none();
        if cancelled {
            self.stats.record_cancellation();
            info!(race_id = %self.engine.race_id(), "Race cancelled before settlement");
        }

        let dropped = if self.settlement.is_none() { self.bet.take() } else { None };
        self.bet = None;
        self.settlement = None;
        self.engine.reset();

        if let Some(bet) = dropped {
            self.history.close_bet(&bet);
            self.emit(GameEvent::BetCleared(bet));
        }
        self.emit(GameEvent::RaceReset { cancelled });
    }

    // -- Bankroll ---------------------------------------------------------

    pub fn deposit_money(&mut self, amount: Decimal) -> Result<(), DerbyError> {
        let before = self.ledger.balance();
        self.ledger.deposit(amount, &mut self.history)?;
        let after = self.ledger.balance();
        self.stats.observe_balance(after);
        self.emit(GameEvent::BalanceChanged { before, after });
        Ok(())
    }

    // -- Undo / redo ------------------------------------------------------

    /// Revert the most recent bet or balance change.
    ///
    /// Only allowed between races. Returns the entry undone, or `None`
    /// when there is nothing to undo. On error nothing changes.
    pub fn undo(&mut self) -> Result<Option<UndoEntry>, DerbyError> {
        self.ensure_idle()?;
        let Some(entry) = self.history.peek_undo().copied() else {
            return Ok(None);
        };

        match entry {
            UndoEntry::BalanceChanged { before, .. } => self.restore_balance(before)?,
            UndoEntry::BetRecorded { closed: true, .. } => {}
            UndoEntry::BetRecorded { bet, closed: false } => {
                if self.bet == Some(bet) {
                    self.bet = None;
                    self.emit(GameEvent::BetCleared(bet));
                }
            }
        }

        self.history.undo();
        debug!(%entry, "Undone");
        Ok(Some(entry))
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self) -> Result<Option<UndoEntry>, DerbyError> {
        self.ensure_idle()?;
        let Some(entry) = self.history.peek_redo().copied() else {
            return Ok(None);
        };

        match entry {
            UndoEntry::BalanceChanged { after, .. } => self.restore_balance(after)?,
            UndoEntry::BetRecorded { closed: true, .. } => {}
            UndoEntry::BetRecorded { bet, closed: false } => {
                if self.bet.is_some() {
                    return Err(DerbyError::RaceInProgress);
                }
                if !self.ledger.can_afford(bet.amount) {
                    return Err(DerbyError::InsufficientBalance {
                        needed: bet.amount,
                        available: self.ledger.balance(),
                    });
                }
                self.bet = Some(bet);
                self.emit(GameEvent::BetPlaced(bet));
            }
        }

        self.history.redo();
        debug!(%entry, "Redone");
        Ok(Some(entry))
    }

    fn ensure_idle(&self) -> Result<(), DerbyError> {
        if self.engine.status() != RaceStatus::Idle {
            return Err(DerbyError::RaceInProgress);
        }
        Ok(())
    }

    fn restore_balance(&mut self, target: Decimal) -> Result<(), DerbyError> {
        if let Some(bet) = &self.bet {
            if bet.amount > target {
                return Err(DerbyError::InsufficientBalance {
                    needed: bet.amount,
                    available: target,
                });
            }
        }
        let before = self.ledger.balance();
        self.ledger.restore(target);
        self.stats.observe_balance(target);
        self.emit(GameEvent::BalanceChanged { before, after: target });
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn engine_mut(&mut self) -> &mut RaceEngine {
        &mut self.engine
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
