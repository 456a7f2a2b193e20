//! Timed "pulse" windows with paid, at-most-once captures.
//!
//! [`engine`] holds the synchronous core; [`driver`] runs it on a tokio
//! clock. [`notice`] and [`journal`] are caller-side layers the binaries use.

pub mod config;
pub mod driver;
pub mod engine;
pub mod journal;
pub mod logging;
pub mod notice;
