//! Cycle configuration and the single long-lived cycle record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credits charged for capturing a normal window.
pub const NORMAL_COST: u64 = 1;
/// Credits charged for capturing a rare (super pulse) window.
pub const RARE_COST: u64 = 3;

// =============================================================================
// Configuration
// =============================================================================

/// Timing and probability parameters of the pulse cycle.
///
/// Fields are private so a `CycleConfig` can only exist in validated form;
/// build one with [`CycleConfig::new`] or a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleConfig {
    min_open_delay: u32,
    max_open_delay: u32,
    window_duration: u32,
    rare_tier_probability: f64,
    warning_threshold: u32,
    close_on_capture: bool,
}

impl CycleConfig {
    /// Validates and builds a configuration. Nothing is clamped.
    pub fn new(
        min_open_delay: u32,
        max_open_delay: u32,
        window_duration: u32,
        rare_tier_probability: f64,
        warning_threshold: u32,
    ) -> Result<Self, ConfigError> {
        if min_open_delay == 0 {
            return Err(ConfigError::ZeroOpenDelay);
        }
        if min_open_delay > max_open_delay {
            return Err(ConfigError::InvertedDelayBounds {
                min: min_open_delay,
                max: max_open_delay,
            });
        }
        if window_duration == 0 {
            return Err(ConfigError::ZeroWindowDuration);
        }
        // NaN fails the range check as well
        if !(0.0..=1.0).contains(&rare_tier_probability) {
            return Err(ConfigError::ProbabilityOutOfRange(rare_tier_probability));
        }
        if warning_threshold >= min_open_delay {
            return Err(ConfigError::WarningNotBeforeOpen {
                threshold: warning_threshold,
                min: min_open_delay,
            });
        }
        Ok(Self {
            min_open_delay,
            max_open_delay,
            window_duration,
            rare_tier_probability,
            warning_threshold,
            close_on_capture: false,
        })
    }

    /// Production cadence: 5 to 15 minutes between 30-second windows.
    pub fn standard() -> Self {
        Self {
            min_open_delay: 300,
            max_open_delay: 900,
            window_duration: 30,
            rare_tier_probability: 0.2,
            warning_threshold: 10,
            close_on_capture: false,
        }
    }

    /// Shortened cadence for demos: 15 to 60 seconds between 15-second windows.
    pub fn demo() -> Self {
        Self {
            min_open_delay: 15,
            max_open_delay: 60,
            window_duration: 15,
            ..Self::standard()
        }
    }

    /// Closes the window as soon as a capture settles instead of at timeout.
    pub fn with_close_on_capture(mut self, enabled: bool) -> Self {
        self.close_on_capture = enabled;
        self
    }

    pub fn min_open_delay(&self) -> u32 {
        self.min_open_delay
    }

    pub fn max_open_delay(&self) -> u32 {
        self.max_open_delay
    }

    pub fn window_duration(&self) -> u32 {
        self.window_duration
    }

    pub fn rare_tier_probability(&self) -> f64 {
        self.rare_tier_probability
    }

    pub fn warning_threshold(&self) -> u32 {
        self.warning_threshold
    }

    pub fn close_on_capture(&self) -> bool {
        self.close_on_capture
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Rejected cycle configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("min open delay must be greater than zero")]
    ZeroOpenDelay,
    #[error("min open delay {min}s exceeds max open delay {max}s")]
    InvertedDelayBounds { min: u32, max: u32 },
    #[error("window duration must be greater than zero")]
    ZeroWindowDuration,
    #[error("rare tier probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),
    #[error("warning threshold {threshold}s must be below min open delay {min}s")]
    WarningNotBeforeOpen { threshold: u32, min: u32 },
}

// =============================================================================
// Cycle state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Countdown,
    Open,
    /// Transient close step. Entered and left inside a single transition.
    Settling,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Countdown => "countdown",
            Phase::Open => "open",
            Phase::Settling => "settling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Normal,
    Rare,
}

impl Tier {
    pub fn from_rare(is_rare: bool) -> Self {
        if is_rare {
            Tier::Rare
        } else {
            Tier::Normal
        }
    }

    /// Credits charged when a window of this tier is captured.
    pub fn cost(&self) -> u64 {
        match self {
            Tier::Normal => NORMAL_COST,
            Tier::Rare => RARE_COST,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Normal => "normal",
            Tier::Rare => "rare",
        }
    }
}

/// The one mutable cycle record. Reset in place, never replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub phase: Phase,
    /// Seconds left in the current phase.
    pub remaining: u32,
    /// Only meaningful while `Open` or `Settling`.
    pub is_rare_tier: bool,
    /// Incremented each time a window opens; 0 before the first window.
    pub window_id: u64,
    /// Warning already fired during this countdown.
    pub warned: bool,
    /// Completed open/close cycles.
    pub cycles_completed: u64,
}

impl CycleState {
    pub fn new(initial_delay: u32) -> Self {
        Self {
            phase: Phase::Countdown,
            remaining: initial_delay,
            is_rare_tier: false,
            window_id: 0,
            warned: false,
            cycles_completed: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Tier of the current window, if one is open.
    pub fn open_tier(&self) -> Option<Tier> {
        self.is_open().then(|| Tier::from_rare(self.is_rare_tier))
    }

    /// Re-enters `Countdown` with a fresh delay. Keeps identity and counters.
    pub(crate) fn restart(&mut self, delay: u32) {
        self.phase = Phase::Countdown;
        self.remaining = delay;
        self.is_rare_tier = false;
        self.warned = false;
    }
}

/// Formats seconds as `MM:SS`. Minutes are zero-padded to two digits but unbounded.
pub fn format_mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
