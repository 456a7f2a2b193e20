//! Structured logging for the pulse engine.
//!
//! One JSON object per line on stderr, filtered by level and domain. When
//! `LOG_DIR` is set, records are also appended to per-run files:
//!
//! ```text
//! $LOG_DIR/<run_id>/events.jsonl   info and above
//! $LOG_DIR/<run_id>/trace.jsonl    trace and debug
//! $LOG_DIR/<run_id>/manifest.json  run id, pid, start time
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::engine::capture::CaptureAttempt;
use crate::engine::events::PulseEvent;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Scheduler, // Countdown, open, close, reset
    Capture,   // Attempts and their outcomes
    Balance,   // Credits and debits
    System,    // Startup, shutdown, summaries
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scheduler => "scheduler",
            Domain::Capture => "capture",
            Domain::Balance => "balance",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();
static MIN_LEVEL: OnceLock<Level> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sinks: Option<RunSinks>,
}

fn run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sinks = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_sinks(PathBuf::from(base).join(&run_id), &run_id));
        RunContext { run_id, sinks }
    })
}

fn open_sinks(run_dir: PathBuf, run_id: &str) -> Option<RunSinks> {
    let opened = (|| -> std::io::Result<RunSinks> {
        create_dir_all(&run_dir)?;
        std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        )?;
        Ok(RunSinks {
            events: Mutex::new(BufWriter::new(File::create(run_dir.join("events.jsonl"))?)),
            trace: Mutex::new(BufWriter::new(File::create(run_dir.join("trace.jsonl"))?)),
        })
    })();
    match opened {
        Ok(sinks) => Some(sinks),
        Err(err) => {
            eprintln!("[log] file sinks disabled: {}", err);
            None
        }
    }
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < *MIN_LEVEL.get_or_init(Level::from_env) || !domain.is_enabled() {
        return;
    }
    let line = render(level, domain, event, fields);
    let ctx = run_context();
    if let Some(sinks) = &ctx.sinks {
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    eprintln!("{}", line);
}

fn render(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) -> String {
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_context().run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));
    Value::Object(entry).to_string()
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

/// Scheduler transitions. Ticks go to trace, warnings to debug.
pub fn log_transition(event: &PulseEvent) {
    let level = match event {
        PulseEvent::Tick { .. } => Level::Trace,
        PulseEvent::Warning | PulseEvent::CountdownStarted { .. } => Level::Debug,
        PulseEvent::WindowOpened { .. } | PulseEvent::WindowClosed { .. } => Level::Info,
    };
    let fields = match serde_json::to_value(event) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    log(level, Domain::Scheduler, event.name(), fields);
}

pub fn log_settlement(attempt: &CaptureAttempt) {
    let level = if attempt.is_accepted() {
        Level::Info
    } else {
        Level::Debug
    };
    log(
        level,
        Domain::Capture,
        attempt.outcome.as_str(),
        obj(&[
            ("window_id", json!(attempt.window_id)),
            ("tier", attempt.tier.map(|t| v_str(t.as_str())).unwrap_or(Value::Null)),
            ("cost", json!(attempt.cost)),
            ("balance_after", json!(attempt.balance_after)),
        ]),
    );
}

pub fn log_credit(amount: u64, balance_after: u64) {
    log(
        Level::Info,
        Domain::Balance,
        "credit",
        obj(&[
            ("amount", json!(amount)),
            ("balance_after", json!(balance_after)),
        ]),
    );
}

pub fn log_reset(reason: &str, aborted_window: Option<u64>) {
    log(
        Level::Info,
        Domain::Scheduler,
        "reset",
        obj(&[
            ("reason", v_str(reason)),
            ("aborted_window", aborted_window.map(|id| json!(id)).unwrap_or(Value::Null)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }

    #[test]
    fn test_render_moves_msg_to_top_level() {
        let line = render(
            Level::Info,
            Domain::Capture,
            "accepted",
            obj(&[("msg", v_str("captured")), ("cost", json!(3))]),
        );
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["component"], "capture");
        assert_eq!(parsed["lvl"], "INFO");
        assert_eq!(parsed["msg"], "captured");
        assert_eq!(parsed["data"]["cost"], 3);
        assert!(parsed["data"].get("msg").is_none());
    }
}
