//! Core pulse engine: a timed countdown/open-window cycle with paid captures.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Tick / Cmd  │────►│  Scheduler   │────►│   Events     │
//! │  (driver)    │     │  (pure fn)   │     │  (hooks)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        │                    │
//!        ▼                    ▼
//! ┌──────────────┐     ┌──────────────┐
//! │   Capture    │◄────│ CycleState   │
//! │  (balance)   │     │ (window_id)  │
//! └──────────────┘     └──────────────┘
//! ```
//!
//! Randomness enters only through [`rng::RandomSource`], so a scripted or
//! seeded source makes every run reproducible.

pub mod capture;
pub mod events;
pub mod invariants;
pub mod pulse;
pub mod rng;
pub mod scheduler;
pub mod state;

pub use capture::{BalanceError, CaptureAttempt, CaptureController, CaptureOutcome};
pub use events::{dispatch, Callbacks, NoHooks, PulseEvent, PulseHooks, Recorder};
pub use pulse::{PulseEngine, PulseSnapshot};
pub use rng::{RandomSource, RngSource, ScriptedSource};
pub use scheduler::{reduce, Input, Scheduler};
pub use state::{format_mm_ss, ConfigError, CycleConfig, CycleState, Phase, Tier};
