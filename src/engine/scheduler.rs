//! Pure scheduler reducer: (CycleState, Input) -> Vec<PulseEvent>
//!
//! All phase transitions happen here. The reducer reads every field it
//! needs from the state record on each call and holds nothing between calls,
//! so there is no captured value that can go stale.
//!
//! ```text
//!            tick (remaining -> 0)          tick (remaining -> 0)
//!  Countdown ─────────────────────► Open ─────────────────────► Settling
//!      ▲                             │   close early (captured)     │
//!      │                             └──────────────────────────────┤
//!      └────────────── fresh delay drawn, same identity ────────────┘
//! ```

use super::events::PulseEvent;
use super::rng::RandomSource;
use super::state::{CycleConfig, CycleState, Phase};

/// Input to the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// One-second advance. `captured` is the capture status of the current
    /// window, read only if this tick closes it.
    Tick { captured: bool },
    /// Close the open window now. Ignored outside `Open`.
    CloseEarly { captured: bool },
    /// Abandon the current cycle and start a new countdown.
    Reset,
}

/// Applies one input to the cycle state.
pub fn reduce<R: RandomSource + ?Sized>(
    state: &mut CycleState,
    input: Input,
    cfg: &CycleConfig,
    rng: &mut R,
) -> Vec<PulseEvent> {
    let mut events = Vec::new();

    match input {
        Input::Tick { captured } => {
            on_tick(state, cfg, rng, captured, &mut events);
            events.push(PulseEvent::Tick {
                phase: state.phase,
                remaining: state.remaining,
            });
        }
        Input::CloseEarly { captured } => {
            if state.phase == Phase::Open {
                close_window(state, cfg, rng, captured, &mut events);
            }
        }
        Input::Reset => {
            start_countdown(state, cfg, rng, &mut events);
        }
    }

    events
}

fn on_tick<R: RandomSource + ?Sized>(
    state: &mut CycleState,
    cfg: &CycleConfig,
    rng: &mut R,
    captured: bool,
    events: &mut Vec<PulseEvent>,
) {
    match state.phase {
        Phase::Countdown => {
            state.remaining = state.remaining.saturating_sub(1);

            let threshold = cfg.warning_threshold();
            if threshold > 0 && !state.warned && state.remaining == threshold {
                state.warned = true;
                events.push(PulseEvent::Warning);
            }

            if state.remaining == 0 {
                open_window(state, cfg, rng, events);
            }
        }
        Phase::Open => {
            state.remaining = state.remaining.saturating_sub(1);
            if state.remaining == 0 {
                close_window(state, cfg, rng, captured, events);
            }
        }
        // Settling never survives a transition; if observed, finish the cycle.
        Phase::Settling => {
            start_countdown(state, cfg, rng, events);
        }
    }
}

fn open_window<R: RandomSource + ?Sized>(
    state: &mut CycleState,
    cfg: &CycleConfig,
    rng: &mut R,
    events: &mut Vec<PulseEvent>,
) {
    state.window_id += 1;
    state.is_rare_tier = rng.draw_unit() < cfg.rare_tier_probability();
    state.phase = Phase::Open;
    state.remaining = cfg.window_duration();
    events.push(PulseEvent::WindowOpened {
        window_id: state.window_id,
        is_rare_tier: state.is_rare_tier,
        window_duration: cfg.window_duration(),
    });
}

fn close_window<R: RandomSource + ?Sized>(
    state: &mut CycleState,
    cfg: &CycleConfig,
    rng: &mut R,
    captured: bool,
    events: &mut Vec<PulseEvent>,
) {
    state.phase = Phase::Settling;
    // Read before the restart clears the tier.
    events.push(PulseEvent::WindowClosed {
        window_id: state.window_id,
        was_captured: captured,
        is_rare_tier: state.is_rare_tier,
    });
    state.cycles_completed += 1;
    start_countdown(state, cfg, rng, events);
}

fn start_countdown<R: RandomSource + ?Sized>(
    state: &mut CycleState,
    cfg: &CycleConfig,
    rng: &mut R,
    events: &mut Vec<PulseEvent>,
) {
    let delay = draw_delay(cfg, rng);
    state.restart(delay);
    events.push(PulseEvent::CountdownStarted { remaining: delay });
}

pub(crate) fn draw_delay<R: RandomSource + ?Sized>(cfg: &CycleConfig, rng: &mut R) -> u32 {
    rng.draw_delay(cfg.min_open_delay(), cfg.max_open_delay())
}

/// Owner of the cycle state and its configuration.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: CycleConfig,
    state: CycleState,
}

impl Scheduler {
    /// Creates the scheduler in `Countdown` with a freshly drawn delay.
    pub fn new<R: RandomSource + ?Sized>(config: CycleConfig, rng: &mut R) -> Self {
        let state = CycleState::new(draw_delay(&config, rng));
        Self { config, state }
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    pub fn apply<R: RandomSource + ?Sized>(&mut self, input: Input, rng: &mut R) -> Vec<PulseEvent> {
        reduce(&mut self.state, input, &self.config, rng)
    }

    /// Swaps the configuration and starts a new countdown under it.
    pub fn reconfigure<R: RandomSource + ?Sized>(
        &mut self,
        config: CycleConfig,
        rng: &mut R,
    ) -> Vec<PulseEvent> {
        self.config = config;
        self.apply(Input::Reset, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rng::ScriptedSource;

    fn tick(s: &mut Scheduler, rng: &mut ScriptedSource) -> Vec<PulseEvent> {
        s.apply(Input::Tick { captured: false }, rng)
    }

    #[test]
    fn test_countdown_opens_on_zero() {
        let cfg = CycleConfig::new(3, 3, 2, 0.0, 0).unwrap();
        let mut rng = ScriptedSource::new();
        let mut s = Scheduler::new(cfg, &mut rng);
        assert_eq!(s.state().remaining, 3);

        tick(&mut s, &mut rng);
        tick(&mut s, &mut rng);
        let events = tick(&mut s, &mut rng);
        assert_eq!(
            events,
            vec![
                PulseEvent::WindowOpened { window_id: 1, is_rare_tier: false, window_duration: 2 },
                PulseEvent::Tick { phase: Phase::Open, remaining: 2 },
            ]
        );
    }

    #[test]
    fn test_no_warning_when_threshold_zero() {
        let cfg = CycleConfig::new(4, 4, 1, 0.0, 0).unwrap();
        let mut rng = ScriptedSource::new();
        let mut s = Scheduler::new(cfg, &mut rng);
        for _ in 0..20 {
            let events = tick(&mut s, &mut rng);
            assert!(!events.contains(&PulseEvent::Warning));
        }
    }

    #[test]
    fn test_rare_draw_uses_probability() {
        let cfg = CycleConfig::new(1, 1, 1, 0.5, 0).unwrap();
        let mut rng = ScriptedSource::new().with_units([0.49, 0.5]);
        let mut s = Scheduler::new(cfg, &mut rng);

        tick(&mut s, &mut rng);
        assert!(s.state().is_rare_tier);
        tick(&mut s, &mut rng); // closes
        tick(&mut s, &mut rng); // reopens
        assert!(s.state().is_open());
        assert!(!s.state().is_rare_tier);
    }

    #[test]
    fn test_close_reports_state_at_close_instant() {
        let cfg = CycleConfig::new(1, 1, 2, 1.0, 0).unwrap();
        let mut rng = ScriptedSource::new().with_units([0.0]);
        let mut s = Scheduler::new(cfg, &mut rng);
        tick(&mut s, &mut rng);
        tick(&mut s, &mut rng);

        let events = s.apply(Input::Tick { captured: true }, &mut rng);
        assert_eq!(
            events[0],
            PulseEvent::WindowClosed { window_id: 1, was_captured: true, is_rare_tier: true }
        );
        assert_eq!(events[1], PulseEvent::CountdownStarted { remaining: 1 });
        assert_eq!(s.state().phase, Phase::Countdown);
        assert!(!s.state().is_rare_tier);
        assert_eq!(s.state().cycles_completed, 1);
    }

    #[test]
    fn test_close_early_ignored_outside_open() {
        let cfg = CycleConfig::new(5, 5, 2, 0.0, 0).unwrap();
        let mut rng = ScriptedSource::new();
        let mut s = Scheduler::new(cfg, &mut rng);
        let before = s.state().clone();
        assert!(s.apply(Input::CloseEarly { captured: true }, &mut rng).is_empty());
        assert_eq!(s.state(), &before);
    }

    #[test]
    fn test_reset_keeps_window_identity() {
        let cfg = CycleConfig::new(1, 1, 5, 0.0, 0).unwrap();
        let mut rng = ScriptedSource::new();
        let mut s = Scheduler::new(cfg, &mut rng);
        tick(&mut s, &mut rng);
        assert!(s.state().is_open());

        let events = s.apply(Input::Reset, &mut rng);
        assert_eq!(events, vec![PulseEvent::CountdownStarted { remaining: 1 }]);
        assert_eq!(s.state().phase, Phase::Countdown);
        assert_eq!(s.state().window_id, 1);
        assert_eq!(s.state().cycles_completed, 0);
    }
}
