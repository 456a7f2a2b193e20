//! Lifecycle notifications and the hook seam used to deliver them.

use serde::{Deserialize, Serialize};

use super::state::Phase;

/// Notification emitted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PulseEvent {
    /// Post-tick snapshot for display. Always last in a tick's batch.
    Tick { phase: Phase, remaining: u32 },
    /// The countdown reached the warning threshold.
    Warning,
    WindowOpened {
        window_id: u64,
        is_rare_tier: bool,
        window_duration: u32,
    },
    /// Captured status and tier as they stood at the close instant.
    WindowClosed {
        window_id: u64,
        was_captured: bool,
        is_rare_tier: bool,
    },
    /// A new countdown began (after a close or a reset).
    CountdownStarted { remaining: u32 },
}

impl PulseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PulseEvent::Tick { .. } => "tick",
            PulseEvent::Warning => "warning",
            PulseEvent::WindowOpened { .. } => "window_opened",
            PulseEvent::WindowClosed { .. } => "window_closed",
            PulseEvent::CountdownStarted { .. } => "countdown_started",
        }
    }
}

/// Receiver of lifecycle notifications. Every method defaults to a no-op.
///
/// The engine calls [`PulseHooks::on_event`] once per event; its default
/// routes to the per-kind methods. Override it to take whole events instead.
pub trait PulseHooks {
    fn on_event(&mut self, event: &PulseEvent) {
        dispatch(self, event);
    }

    fn on_warning(&mut self) {}

    fn on_window_opened(&mut self, _is_rare_tier: bool, _window_duration: u32) {}

    fn on_window_closed(&mut self, _was_captured: bool, _is_rare_tier: bool) {}

    fn on_tick(&mut self, _phase: Phase, _remaining: u32) {}

    fn on_countdown_started(&mut self, _remaining: u32) {}
}

/// Routes one event to the matching hook method.
pub fn dispatch<H: PulseHooks + ?Sized>(hooks: &mut H, event: &PulseEvent) {
    match *event {
        PulseEvent::Tick { phase, remaining } => hooks.on_tick(phase, remaining),
        PulseEvent::Warning => hooks.on_warning(),
        PulseEvent::WindowOpened {
            is_rare_tier,
            window_duration,
            ..
        } => hooks.on_window_opened(is_rare_tier, window_duration),
        PulseEvent::WindowClosed {
            was_captured,
            is_rare_tier,
            ..
        } => hooks.on_window_closed(was_captured, is_rare_tier),
        PulseEvent::CountdownStarted { remaining } => hooks.on_countdown_started(remaining),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl PulseHooks for NoHooks {}

type WarningFn = Box<dyn FnMut() + Send>;
type OpenedFn = Box<dyn FnMut(bool, u32) + Send>;
type ClosedFn = Box<dyn FnMut(bool, bool) + Send>;
type TickFn = Box<dyn FnMut(Phase, u32) + Send>;

/// Closure-based hooks; unset callbacks are skipped.
#[derive(Default)]
pub struct Callbacks {
    on_warning: Option<WarningFn>,
    on_window_opened: Option<OpenedFn>,
    on_window_closed: Option<ClosedFn>,
    on_tick: Option<TickFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_warning(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_warning = Some(Box::new(f));
        self
    }

    pub fn on_window_opened(mut self, f: impl FnMut(bool, u32) + Send + 'static) -> Self {
        self.on_window_opened = Some(Box::new(f));
        self
    }

    pub fn on_window_closed(mut self, f: impl FnMut(bool, bool) + Send + 'static) -> Self {
        self.on_window_closed = Some(Box::new(f));
        self
    }

    pub fn on_tick(mut self, f: impl FnMut(Phase, u32) + Send + 'static) -> Self {
        self.on_tick = Some(Box::new(f));
        self
    }
}

impl PulseHooks for Callbacks {
    fn on_warning(&mut self) {
        if let Some(f) = self.on_warning.as_mut() {
            f();
        }
    }

    fn on_window_opened(&mut self, is_rare_tier: bool, window_duration: u32) {
        if let Some(f) = self.on_window_opened.as_mut() {
            f(is_rare_tier, window_duration);
        }
    }

    fn on_window_closed(&mut self, was_captured: bool, is_rare_tier: bool) {
        if let Some(f) = self.on_window_closed.as_mut() {
            f(was_captured, is_rare_tier);
        }
    }

    fn on_tick(&mut self, phase: Phase, remaining: u32) {
        if let Some(f) = self.on_tick.as_mut() {
            f(phase, remaining);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_warning", &self.on_warning.is_some())
            .field("on_window_opened", &self.on_window_opened.is_some())
            .field("on_window_closed", &self.on_window_closed.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .finish()
    }
}

/// Collects every event; handy for tests and replay.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub events: Vec<PulseEvent>,
}

impl Recorder {
    pub fn take(&mut self) -> Vec<PulseEvent> {
        std::mem::take(&mut self.events)
    }
}

impl PulseHooks for Recorder {
    fn on_event(&mut self, event: &PulseEvent) {
        self.events.push(*event);
    }
}
