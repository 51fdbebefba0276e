//! Race engine — speed assignment, per-tick stepping, and winner detection.
//!
//! The engine has no timer. Callers drive it one `step` per simulated
//! frame, handing in the finish threshold from their track geometry.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::horse::Horse;
use crate::config::RaceConfig;
use crate::types::{DerbyError, HorseNumber, RaceStatus, SpeedPolicy};

pub struct RaceEngine {
    /// Sorted by ascending horse number; iteration order is the tie-break.
    horses: Vec<Horse>,
    config: RaceConfig,
    status: RaceStatus,
    policy: SpeedPolicy,
    winner: Option<HorseNumber>,
    favourite: Option<HorseNumber>,
    race_id: Uuid,
    ticks: u64,
    rng: StdRng,
}

impl RaceEngine {
    /// Create an engine with horses numbered `1..=horse_count`.
    ///
    /// Needs at least two horses and a race config that passes
    /// [`RaceConfig::validate`].
    pub fn new(horse_count: u32, config: RaceConfig) -> Result<Self, DerbyError> {
        if horse_count < 2 {
            return Err(DerbyError::Config(format!(
                "a race needs at least 2 horses, got {horse_count}"
            )));
        }
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            horses: (1..=horse_count).map(Horse::new).collect(),
            policy: config.policy,
            config,
            status: RaceStatus::Idle,
            winner: None,
            favourite: None,
            race_id: Uuid::new_v4(),
            ticks: 0,
            rng,
        })
    }

    // -- Read side --------------------------------------------------------

    pub fn horses(&self) -> &[Horse] {
        &self.horses
    }

    pub fn horse(&self, number: HorseNumber) -> Option<&Horse> {
        self.horses.iter().find(|h| h.number == number)
    }

    pub fn horse_count(&self) -> u32 {
        self.horses.len() as u32
    }

    pub fn has_horse(&self, number: HorseNumber) -> bool {
        self.horse(number).is_some()
    }

    /// `(number, position)` for every horse, ascending by number.
    pub fn positions(&self) -> Vec<(HorseNumber, f64)> {
        self.horses.iter().map(|h| (h.number, h.position)).collect()
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn winner(&self) -> Option<HorseNumber> {
        self.winner
    }

    /// Policy of the current race, or the configured one while idle.
    pub fn policy(&self) -> SpeedPolicy {
        self.policy
    }

    /// The pre-selected winner under [`SpeedPolicy::Predetermined`].
    pub fn favourite(&self) -> Option<HorseNumber> {
        self.favourite
    }

    pub fn race_id(&self) -> Uuid {
        self.race_id
    }

    /// Ticks stepped in the current race.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    // -- Transitions ------------------------------------------------------

    /// Move a horse to a custom start position before the race.
    pub fn place_horse(&mut self, number: HorseNumber, position: f64) -> Result<(), DerbyError> {
        self.expect_status(RaceStatus::Idle)?;
        let horse = self
            .horses
            .iter_mut()
            .find(|h| h.number == number)
            .ok_or(DerbyError::UnknownHorse(number))?;
        horse.position = position.max(0.0);
        Ok(())
    }

    /// Start a race: every horse goes to `start_position` and receives a
    /// speed under `policy`.
    pub fn setup(&mut self, start_position: f64, policy: SpeedPolicy) -> Result<(), DerbyError> {
        self.expect_status(RaceStatus::Idle)?;
        for horse in &mut self.horses {
            horse.reset(start_position);
        }
        self.begin(policy);
        Ok(())
    }

    /// Start a race keeping the horses where they stand.
    pub fn setup_speeds(&mut self, policy: SpeedPolicy) -> Result<(), DerbyError> {
        self.expect_status(RaceStatus::Idle)?;
        self.begin(policy);
        Ok(())
    }

    fn begin(&mut self, policy: SpeedPolicy) {
        self.winner = None;
        self.ticks = 0;
        self.policy = policy;
        self.race_id = Uuid::new_v4();
        self.assign_speeds(policy);
        self.status = RaceStatus::Running;

        debug!(
            race_id = %self.race_id,
            %policy,
            horses = self.horses.len(),
            "Race started"
        );
    }

    fn assign_speeds(&mut self, policy: SpeedPolicy) {
        let (min, max) = (self.config.start_speed_min, self.config.start_speed_max);
        match policy {
            SpeedPolicy::Emergent => {
                self.favourite = None;
                for horse in &mut self.horses {
                    horse.assign_random_speed(&mut self.rng, min, max);
                }
            }
            SpeedPolicy::Predetermined => {
                let pick = self.rng.gen_range(0..self.horses.len());
                let favourite = self.horses[pick].number;
                self.favourite = Some(favourite);
                for horse in &mut self.horses {
                    if horse.number == favourite {
                        horse.speed = self.config.favourite_speed;
                    } else {
                        horse.assign_random_speed(&mut self.rng, min, max);
                    }
                }
                debug!(race_id = %self.race_id, favourite, "Favourite pre-selected");
            }
        }
    }

    /// Advance the race by one tick.
    ///
    /// Returns the winner on the tick it is decided. Once finished, further
    /// steps are ignored and return `None` without moving any horse.
    pub fn step(&mut self, finish_threshold: f64) -> Result<Option<HorseNumber>, DerbyError> {
        match self.status {
            RaceStatus::Idle => {
                return Err(DerbyError::InvalidState {
                    expected: RaceStatus::Running,
                    actual: RaceStatus::Idle,
                })
            }
            RaceStatus::Finished => {
                trace!(race_id = %self.race_id, "Step ignored: race finished");
                return Ok(None);
            }
            RaceStatus::Running => {}
        }

        let drift = self.policy == SpeedPolicy::Emergent;
        for horse in &mut self.horses {
            if drift {
                horse.drift_speed(
                    &mut self.rng,
                    self.config.drift_range,
                    self.config.speed_floor,
                    self.config.speed_ceiling,
                );
            }
            horse.advance();
        }
        self.ticks += 1;

        let crossed = self
            .horses
            .iter()
            .find(|h| h.position >= finish_threshold)
            .map(|h| h.number);

        if let Some(winner) = crossed {
            self.winner = Some(winner);
            self.status = RaceStatus::Finished;
            info!(
                race_id = %self.race_id,
                winner,
                ticks = self.ticks,
                "Winner crossed the line"
            );
        }
        Ok(crossed)
    }

    /// Clear the winner and return every horse to zero, standing still.
    pub fn reset(&mut self) {
        self.winner = None;
        self.favourite = None;
        self.ticks = 0;
        self.policy = self.config.policy;
        for horse in &mut self.horses {
            horse.reset(0.0);
        }
        self.status = RaceStatus::Idle;
        debug!(race_id = %self.race_id, "Race reset");
    }

    fn expect_status(&self, expected: RaceStatus) -> Result<(), DerbyError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(DerbyError::InvalidState {
                expected,
                actual: self.status,
            })
        }
    }

    #[cfg(test)]
    pub(crate) fn horse_mut(&mut self, number: HorseNumber) -> Option<&mut Horse> {
        self.horses.iter_mut().find(|h| h.number == number)
    }
}
