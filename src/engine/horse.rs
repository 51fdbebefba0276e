//! Per-horse position and speed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::HorseNumber;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Horse {
    pub number: HorseNumber,
    pub position: f64,
    pub speed: f64,
}

impl Horse {
    pub fn new(number: HorseNumber) -> Self {
        Self {
            number,
            position: 0.0,
            speed: 0.0,
        }
    }

    /// Put the horse back on the start line, standing still.
    pub fn reset(&mut self, start_position: f64) {
        self.position = start_position;
        self.speed = 0.0;
    }

    /// Draw a speed uniformly from `[min_speed, max_speed]`.
    pub fn assign_random_speed<R: Rng>(&mut self, rng: &mut R, min_speed: f64, max_speed: f64) {
        self.speed = rng.gen_range(min_speed..=max_speed);
    }

    /// Perturb the speed by a uniform draw from `[-delta_range, delta_range]`
    /// and clamp into `[clamp_min, clamp_max]`.
    pub fn drift_speed<R: Rng>(
        &mut self,
        rng: &mut R,
        delta_range: f64,
        clamp_min: f64,
        clamp_max: f64,
    ) {
        let delta = if delta_range > 0.0 {
            rng.gen_range(-delta_range..=delta_range)
        } else {
            0.0
        };
        self.speed = (self.speed + delta).clamp(clamp_min, clamp_max);
    }

    pub fn advance(&mut self) {
        self.position += self.speed;
    }
}
