//! Runtime checks for the cycle invariants.
//!
//! `check_state` validates a resting state; `SequenceChecker` validates the
//! order of emitted events across many cycles.

use super::events::PulseEvent;
use super::state::{CycleConfig, CycleState, Phase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub msg: String,
}

impl InvariantViolation {
    fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invariant violation: {}", self.msg)
    }
}

impl std::error::Error for InvariantViolation {}

pub fn check_state(state: &CycleState, cfg: &CycleConfig) -> Result<(), InvariantViolation> {
    match state.phase {
        Phase::Settling => Err(InvariantViolation::new("settling observed at rest")),
        Phase::Countdown => {
            if state.remaining == 0 || state.remaining > cfg.max_open_delay() {
                return Err(InvariantViolation::new(format!(
                    "countdown remaining {} outside [1, {}]",
                    state.remaining,
                    cfg.max_open_delay()
                )));
            }
            Ok(())
        }
        Phase::Open => {
            if state.remaining == 0 || state.remaining > cfg.window_duration() {
                return Err(InvariantViolation::new(format!(
                    "open remaining {} outside [1, {}]",
                    state.remaining,
                    cfg.window_duration()
                )));
            }
            Ok(())
        }
    }
}

/// Tracks event order across cycles.
///
/// Resets (a `CountdownStarted` while a window is open) abandon the window
/// without a close and are counted, not flagged.
#[derive(Debug, Clone)]
pub struct SequenceChecker {
    min_delay: u32,
    max_delay: u32,
    open_window: Option<u64>,
    warned: bool,
    pub opened: u64,
    pub closed: u64,
    pub rare: u64,
    pub aborted: u64,
}

impl SequenceChecker {
    pub fn new(cfg: &CycleConfig) -> Self {
        Self {
            min_delay: cfg.min_open_delay(),
            max_delay: cfg.max_open_delay(),
            open_window: None,
            warned: false,
            opened: 0,
            closed: 0,
            rare: 0,
            aborted: 0,
        }
    }

    pub fn observe(&mut self, event: &PulseEvent) -> Result<(), InvariantViolation> {
        match *event {
            PulseEvent::Warning => {
                if self.open_window.is_some() {
                    return Err(InvariantViolation::new("warning while a window is open"));
                }
                if self.warned {
                    return Err(InvariantViolation::new("second warning in one countdown"));
                }
                self.warned = true;
            }
            PulseEvent::WindowOpened { window_id, is_rare_tier, .. } => {
                if let Some(open) = self.open_window {
                    return Err(InvariantViolation::new(format!(
                        "window {} opened while window {} still open",
                        window_id, open
                    )));
                }
                self.open_window = Some(window_id);
                self.opened += 1;
                if is_rare_tier {
                    self.rare += 1;
                }
            }
            PulseEvent::WindowClosed { window_id, .. } => {
                if self.open_window != Some(window_id) {
                    return Err(InvariantViolation::new(format!(
                        "window {} closed without matching open",
                        window_id
                    )));
                }
                self.open_window = None;
                self.closed += 1;
            }
            PulseEvent::CountdownStarted { remaining } => {
                if remaining < self.min_delay || remaining > self.max_delay {
                    return Err(InvariantViolation::new(format!(
                        "countdown draw {} outside [{}, {}]",
                        remaining, self.min_delay, self.max_delay
                    )));
                }
                if self.open_window.take().is_some() {
                    self.aborted += 1;
                }
                self.warned = false;
            }
            PulseEvent::Tick { .. } => {}
        }
        Ok(())
    }

    /// Share of opened windows that were rare.
    pub fn rare_fraction(&self) -> f64 {
        if self.opened == 0 {
            0.0
        } else {
            self.rare as f64 / self.opened as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CycleConfig {
        CycleConfig::new(5, 8, 3, 0.2, 2).unwrap()
    }

    #[test]
    fn test_check_state_bounds() {
        let cfg = cfg();
        let mut state = CycleState::new(8);
        assert!(check_state(&state, &cfg).is_ok());
        state.remaining = 9;
        assert!(check_state(&state, &cfg).is_err());
        state.phase = Phase::Open;
        state.remaining = 3;
        assert!(check_state(&state, &cfg).is_ok());
        state.phase = Phase::Settling;
        assert!(check_state(&state, &cfg).is_err());
    }

    #[test]
    fn test_sequence_rejects_double_open() {
        let mut chk = SequenceChecker::new(&cfg());
        let open = |id| PulseEvent::WindowOpened { window_id: id, is_rare_tier: false, window_duration: 3 };
        assert!(chk.observe(&open(1)).is_ok());
        assert!(chk.observe(&open(2)).is_err());
    }

    #[test]
    fn test_sequence_rejects_orphan_close_and_repeat_warning() {
        let mut chk = SequenceChecker::new(&cfg());
        let close = PulseEvent::WindowClosed { window_id: 4, was_captured: false, is_rare_tier: false };
        assert!(chk.observe(&close).is_err());

        let mut chk = SequenceChecker::new(&cfg());
        assert!(chk.observe(&PulseEvent::Warning).is_ok());
        assert!(chk.observe(&PulseEvent::Warning).is_err());
    }

    #[test]
    fn test_sequence_counts_aborted_windows() {
        let mut chk = SequenceChecker::new(&cfg());
        chk.observe(&PulseEvent::WindowOpened { window_id: 1, is_rare_tier: true, window_duration: 3 })
            .unwrap();
        chk.observe(&PulseEvent::CountdownStarted { remaining: 6 }).unwrap();
        assert_eq!(chk.aborted, 1);
        assert_eq!(chk.rare_fraction(), 1.0);
        assert!(chk.observe(&PulseEvent::CountdownStarted { remaining: 2 }).is_err());
    }
}
