//! The engine facade: scheduler + capture controller + random source + hooks.
//!
//! Every method takes `&mut self`, so ticks and capture attempts are
//! serialized by ownership. A capture between two ticks sees the state the
//! last tick left behind.

use serde::{Deserialize, Serialize};

use super::capture::{BalanceError, CaptureAttempt, CaptureController};
use super::events::{NoHooks, PulseEvent, PulseHooks};
use super::rng::RandomSource;
use super::scheduler::{Input, Scheduler};
use super::state::{format_mm_ss, CycleConfig, CycleState, Phase, Tier};
use crate::logging::{log_credit, log_reset, log_settlement, log_transition};

/// Point-in-time view for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    pub phase: Phase,
    pub remaining: u32,
    pub display: String,
    pub window_id: u64,
    pub tier: Option<Tier>,
    pub captured: bool,
    pub balance: u64,
    pub cycles_completed: u64,
}

#[derive(Debug)]
pub struct PulseEngine<R, H = NoHooks> {
    scheduler: Scheduler,
    capture: CaptureController,
    rng: R,
    hooks: H,
}

impl<R: RandomSource> PulseEngine<R, NoHooks> {
    pub fn new(config: CycleConfig, rng: R, balance: u64) -> Self {
        Self::with_hooks(config, rng, balance, NoHooks)
    }
}

impl<R: RandomSource, H: PulseHooks> PulseEngine<R, H> {
    pub fn with_hooks(config: CycleConfig, mut rng: R, balance: u64, hooks: H) -> Self {
        let scheduler = Scheduler::new(config, &mut rng);
        Self {
            scheduler,
            capture: CaptureController::new(balance),
            rng,
            hooks,
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Advances one second.
    pub fn tick(&mut self) -> Vec<PulseEvent> {
        let captured = self.is_captured();
        self.apply(Input::Tick { captured })
    }

    pub fn attempt_capture(&mut self) -> CaptureAttempt {
        let attempt = self.capture.attempt_capture(self.scheduler.state());
        log_settlement(&attempt);
        if attempt.is_accepted() && self.scheduler.config().close_on_capture() {
            self.apply(Input::CloseEarly { captured: true });
        }
        attempt
    }

    /// Adds purchased credits. Returns the new balance.
    pub fn credit_balance(&mut self, amount: u64) -> Result<u64, BalanceError> {
        let balance = self.capture.credit_balance(amount)?;
        log_credit(amount, balance);
        Ok(balance)
    }

    /// Starts a fresh countdown from any phase. An open window is abandoned
    /// without a `WindowClosed` event.
    pub fn reset(&mut self) -> Vec<PulseEvent> {
        let aborted = self.state().is_open().then_some(self.window_id());
        log_reset("reset", aborted);
        self.apply(Input::Reset)
    }

    /// Like [`reset`](Self::reset), but an open window is closed first so its
    /// `WindowClosed` event is still delivered.
    pub fn graceful_reset(&mut self) -> Vec<PulseEvent> {
        if self.state().is_open() {
            log_reset("graceful_reset", None);
            let captured = self.is_captured();
            self.apply(Input::CloseEarly { captured })
        } else {
            self.reset()
        }
    }

    /// Replaces the cycle configuration and starts a new countdown under it.
    /// Balance and capture history are kept.
    pub fn reconfigure(&mut self, config: CycleConfig) -> Vec<PulseEvent> {
        let aborted = self.state().is_open().then_some(self.window_id());
        log_reset("reconfigure", aborted);
        let events = self.scheduler.reconfigure(config, &mut self.rng);
        self.emit(&events);
        events
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn state(&self) -> &CycleState {
        self.scheduler.state()
    }

    pub fn config(&self) -> &CycleConfig {
        self.scheduler.config()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn remaining(&self) -> u32 {
        self.state().remaining
    }

    /// `remaining` as `MM:SS`.
    pub fn display_time(&self) -> String {
        format_mm_ss(self.remaining())
    }

    pub fn balance(&self) -> u64 {
        self.capture.balance()
    }

    pub fn window_id(&self) -> u64 {
        self.state().window_id
    }

    pub fn is_rare_tier(&self) -> bool {
        self.state().is_open() && self.state().is_rare_tier
    }

    /// Whether a window is open and already captured.
    pub fn is_captured(&self) -> bool {
        self.state().is_open() && self.capture.is_captured(self.window_id())
    }

    pub fn snapshot(&self) -> PulseSnapshot {
        let state = self.state();
        PulseSnapshot {
            phase: state.phase,
            remaining: state.remaining,
            display: format_mm_ss(state.remaining),
            window_id: state.window_id,
            tier: state.open_tier(),
            captured: self.is_captured(),
            balance: self.balance(),
            cycles_completed: state.cycles_completed,
        }
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    fn apply(&mut self, input: Input) -> Vec<PulseEvent> {
        let events = self.scheduler.apply(input, &mut self.rng);
        self.emit(&events);
        events
    }

    fn emit(&mut self, events: &[PulseEvent]) {
        for event in events {
            log_transition(event);
            self.hooks.on_event(event);
        }
    }
}
