//! Async clock for the pulse engine.
//!
//! The engine is moved into a single tokio task. That task owns the ticker
//! and drains a command channel, so ticks and commands are applied one at a
//! time and never overlap. Dropping the driver aborts the task, which stops
//! the clock and releases the engine.

use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

use crate::engine::{
    BalanceError, CaptureAttempt, CycleConfig, PulseEngine, PulseEvent, PulseHooks,
    PulseSnapshot, RandomSource,
};
use crate::logging::{log, obj, Domain, Level};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("pulse driver is not running")]
    Stopped,
}

/// Hooks that forward every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    tx: mpsc::UnboundedSender<PulseEvent>,
}

impl ChannelHooks {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PulseEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PulseHooks for ChannelHooks {
    fn on_event(&mut self, event: &PulseEvent) {
        // A closed receiver only means nobody is listening.
        let _ = self.tx.send(*event);
    }
}

enum Command {
    Capture(oneshot::Sender<CaptureAttempt>),
    Credit(u64, oneshot::Sender<Result<u64, BalanceError>>),
    Reset { graceful: bool, reply: oneshot::Sender<()> },
    Reconfigure(CycleConfig, oneshot::Sender<()>),
    Snapshot(oneshot::Sender<PulseSnapshot>),
    Shutdown(oneshot::Sender<PulseSnapshot>),
}

/// Handle to a running engine task.
#[derive(Debug)]
pub struct PulseDriver {
    cmd_tx: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl PulseDriver {
    /// Moves `engine` into a new task that ticks it once per `period`.
    /// The first tick lands one full period after the call.
    pub fn spawn<R, H>(engine: PulseEngine<R, H>, period: Duration) -> Self
    where
        R: RandomSource + Send + 'static,
        H: PulseHooks + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        log(
            Level::Info,
            Domain::System,
            "driver_started",
            obj(&[
                ("period_ms", json!(period.as_millis() as u64)),
                ("remaining", json!(engine.remaining())),
            ]),
        );
        let handle = tokio::spawn(run(engine, period, cmd_rx));
        Self {
            cmd_tx,
            handle: Some(handle),
        }
    }

    pub async fn attempt_capture(&self) -> Result<CaptureAttempt, DriverError> {
        self.request(Command::Capture).await
    }

    /// Credits the balance. The outer error means the driver is gone; the
    /// inner one is the engine rejecting the amount.
    pub async fn credit_balance(
        &self,
        amount: u64,
    ) -> Result<Result<u64, BalanceError>, DriverError> {
        self.request(|reply| Command::Credit(amount, reply)).await
    }

    /// Abrupt reset; see [`PulseEngine::reset`].
    pub async fn reset(&self) -> Result<(), DriverError> {
        self.request(|reply| Command::Reset { graceful: false, reply }).await
    }

    pub async fn graceful_reset(&self) -> Result<(), DriverError> {
        self.request(|reply| Command::Reset { graceful: true, reply }).await
    }

    pub async fn reconfigure(&self, config: CycleConfig) -> Result<(), DriverError> {
        self.request(|reply| Command::Reconfigure(config, reply)).await
    }

    pub async fn snapshot(&self) -> Result<PulseSnapshot, DriverError> {
        self.request(Command::Snapshot).await
    }

    /// Stops the clock and waits for the task to finish. Returns the last
    /// snapshot taken inside the task.
    pub async fn shutdown(mut self) -> Result<PulseSnapshot, DriverError> {
        let last = self.request(Command::Shutdown).await?;
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        Ok(last)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DriverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| DriverError::Stopped)?;
        reply_rx.await.map_err(|_| DriverError::Stopped)
    }
}

impl Drop for PulseDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run<R, H>(
    mut engine: PulseEngine<R, H>,
    period: Duration,
    mut cmd_rx: mpsc::Receiver<Command>,
) where
    R: RandomSource,
    H: PulseHooks,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                if let Some(reply) = handle_command(&mut engine, &mut ticker, cmd) {
                    let _ = reply.send(engine.snapshot());
                    break;
                }
            }
            _ = ticker.tick() => {
                engine.tick();
            }
        }
    }

    log(
        Level::Info,
        Domain::System,
        "driver_stopped",
        obj(&[
            ("balance", json!(engine.balance())),
            ("cycles_completed", json!(engine.state().cycles_completed)),
        ]),
    );
}

/// Applies one command. Returns the shutdown reply when the loop should stop.
fn handle_command<R, H>(
    engine: &mut PulseEngine<R, H>,
    ticker: &mut Interval,
    cmd: Command,
) -> Option<oneshot::Sender<PulseSnapshot>>
where
    R: RandomSource,
    H: PulseHooks,
{
    match cmd {
        Command::Capture(reply) => {
            let attempt = engine.attempt_capture();
            // An early close already started the next countdown.
            if attempt.is_accepted() && !engine.state().is_open() {
                ticker.reset();
            }
            let _ = reply.send(attempt);
        }
        Command::Credit(amount, reply) => {
            let _ = reply.send(engine.credit_balance(amount));
        }
        Command::Reset { graceful, reply } => {
            if graceful {
                engine.graceful_reset();
            } else {
                engine.reset();
            }
            // A fresh countdown gets a full period before its first tick.
            ticker.reset();
            let _ = reply.send(());
        }
        Command::Reconfigure(config, reply) => {
            engine.reconfigure(config);
            ticker.reset();
            let _ = reply.send(());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(engine.snapshot());
        }
        Command::Shutdown(reply) => return Some(reply),
    }
    None
}
