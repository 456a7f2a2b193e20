//! Injectable randomness for countdown and tier draws.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the two draws the scheduler makes.
pub trait RandomSource {
    /// Uniform integer in `[min, max]`, inclusive. Callers guarantee `min <= max`.
    fn draw_delay(&mut self, min: u32, max: u32) -> u32;

    /// Uniform real in `[0, 1)`.
    fn draw_unit(&mut self) -> f64;
}

/// Adapter over any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// Reproducible source for simulations and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn draw_delay(&mut self, min: u32, max: u32) -> u32 {
        self.rng.gen_range(min..=max)
    }

    fn draw_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays fixed draws in order.
///
/// When a queue runs dry, delays fall back to `min` and units to `1.0`
/// (never rare for any probability below 1).
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    delays: VecDeque<u32>,
    units: VecDeque<f64>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(mut self, delays: impl IntoIterator<Item = u32>) -> Self {
        self.delays.extend(delays);
        self
    }

    pub fn with_units(mut self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units.extend(units);
        self
    }
}

impl RandomSource for ScriptedSource {
    fn draw_delay(&mut self, min: u32, max: u32) -> u32 {
        self.delays
            .pop_front()
            .map(|d| d.clamp(min, max))
            .unwrap_or(min)
    }

    fn draw_unit(&mut self) -> f64 {
        self.units.pop_front().unwrap_or(1.0)
    }
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn draw_delay(&mut self, min: u32, max: u32) -> u32 {
        (**self).draw_delay(min, max)
    }

    fn draw_unit(&mut self) -> f64 {
        (**self).draw_unit()
    }
}

impl<T: RandomSource + ?Sized> RandomSource for Box<T> {
    fn draw_delay(&mut self, min: u32, max: u32) -> u32 {
        (**self).draw_delay(min, max)
    }

    fn draw_unit(&mut self) -> f64 {
        (**self).draw_unit()
    }
}
