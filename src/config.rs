//! Runtime configuration read from the environment.

use std::path::PathBuf;

use tokio::time::Duration;

use crate::engine::{ConfigError, CycleConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub demo: bool,
    pub min_open_delay: u32,
    pub max_open_delay: u32,
    pub window_duration: u32,
    pub rare_tier_probability: f64,
    pub warning_threshold: u32,
    pub close_on_capture: bool,
    pub start_balance: u64,
    /// Credits added per purchase.
    pub topup: u64,
    pub tick_ms: u64,
    pub seed: Option<u64>,
    pub journal_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            get(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };
        Self {
            demo: flag("PULSE_DEMO"),
            min_open_delay: get("PULSE_MIN_DELAY").and_then(|v| v.parse().ok()).unwrap_or(300),
            max_open_delay: get("PULSE_MAX_DELAY").and_then(|v| v.parse().ok()).unwrap_or(900),
            window_duration: get("PULSE_WINDOW").and_then(|v| v.parse().ok()).unwrap_or(30),
            rare_tier_probability: get("PULSE_RARE_PROB").and_then(|v| v.parse().ok()).unwrap_or(0.2),
            warning_threshold: get("PULSE_WARN_AT").and_then(|v| v.parse().ok()).unwrap_or(10),
            close_on_capture: flag("PULSE_CLOSE_ON_CAPTURE"),
            start_balance: get("PULSE_START_BALANCE").and_then(|v| v.parse().ok()).unwrap_or(15),
            topup: get("PULSE_TOPUP").and_then(|v| v.parse().ok()).unwrap_or(10),
            tick_ms: get("PULSE_TICK_MS").and_then(|v| v.parse().ok()).unwrap_or(1000),
            seed: get("PULSE_SEED").and_then(|v| v.parse().ok()),
            journal_path: get("PULSE_JOURNAL").map(PathBuf::from),
        }
    }

    /// Validated cycle config. The demo preset replaces the delay and window
    /// fields; probability, warning and early close still come from here.
    pub fn cycle(&self) -> Result<CycleConfig, ConfigError> {
        self.cycle_with_demo(self.demo)
    }

    /// Like [`cycle`](Self::cycle) with the demo preset forced on or off.
    pub fn cycle_with_demo(&self, demo: bool) -> Result<CycleConfig, ConfigError> {
        let (min, max, window) = if demo {
            let demo = CycleConfig::demo();
            (demo.min_open_delay(), demo.max_open_delay(), demo.window_duration())
        } else {
            (self.min_open_delay, self.max_open_delay, self.window_duration)
        };
        Ok(CycleConfig::new(
            min,
            max,
            window,
            self.rare_tier_probability,
            self.warning_threshold,
        )?
        .with_close_on_capture(self.close_on_capture))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
