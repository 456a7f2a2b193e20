//! Driver timing under tokio's paused clock.

use market_pulse::driver::{ChannelHooks, PulseDriver};
use market_pulse::engine::{
    CaptureOutcome, CycleConfig, Phase, PulseEngine, PulseEvent, ScriptedSource,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, Instant};

const SECOND: Duration = Duration::from_secs(1);

fn spawn(cfg: CycleConfig, balance: u64) -> (PulseDriver, UnboundedReceiver<PulseEvent>) {
    let (hooks, rx) = ChannelHooks::channel();
    let engine = PulseEngine::with_hooks(cfg, ScriptedSource::new(), balance, hooks);
    (PulseDriver::spawn(engine, SECOND), rx)
}

async fn next_matching(
    rx: &mut UnboundedReceiver<PulseEvent>,
    pred: impl Fn(&PulseEvent) -> bool,
) -> PulseEvent {
    loop {
        let event = rx.recv().await.expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_opens_after_drawn_delay() {
    let cfg = CycleConfig::new(4, 4, 2, 0.0, 0).unwrap();
    let start = Instant::now();
    let (_driver, mut rx) = spawn(cfg, 0);

    next_matching(&mut rx, |e| matches!(e, PulseEvent::WindowOpened { .. })).await;
    assert_eq!(start.elapsed(), 4 * SECOND);

    let closed = next_matching(&mut rx, |e| matches!(e, PulseEvent::WindowClosed { .. })).await;
    assert_eq!(start.elapsed(), 6 * SECOND);
    assert_eq!(
        closed,
        PulseEvent::WindowClosed { window_id: 1, was_captured: false, is_rare_tier: false }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_restarts_tick_period() {
    let cfg = CycleConfig::new(3, 3, 2, 0.0, 0).unwrap();
    let (driver, mut rx) = spawn(cfg, 0);

    next_matching(&mut rx, |e| matches!(e, PulseEvent::Tick { .. })).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let reset_at = Instant::now();
    driver.reset().await.unwrap();
    assert_eq!(
        next_matching(&mut rx, |e| matches!(e, PulseEvent::CountdownStarted { .. })).await,
        PulseEvent::CountdownStarted { remaining: 3 }
    );
    let tick = next_matching(&mut rx, |e| matches!(e, PulseEvent::Tick { .. })).await;
    assert_eq!(tick, PulseEvent::Tick { phase: Phase::Countdown, remaining: 2 });
    assert_eq!(reset_at.elapsed(), SECOND);
}

#[tokio::test(start_paused = true)]
async fn test_capture_and_credit_through_driver() {
    let cfg = CycleConfig::new(2, 2, 5, 0.0, 0).unwrap().with_close_on_capture(true);
    let (driver, mut rx) = spawn(cfg, 0);

    next_matching(&mut rx, |e| matches!(e, PulseEvent::WindowOpened { .. })).await;
    let broke = driver.attempt_capture().await.unwrap();
    assert_eq!(broke.outcome, CaptureOutcome::RejectedInsufficientBalance);

    assert_eq!(driver.credit_balance(10).await.unwrap(), Ok(10));
    let paid = driver.attempt_capture().await.unwrap();
    assert_eq!(paid.outcome, CaptureOutcome::Accepted);

    let closed = next_matching(&mut rx, |e| matches!(e, PulseEvent::WindowClosed { .. })).await;
    assert_eq!(
        closed,
        PulseEvent::WindowClosed { window_id: 1, was_captured: true, is_rare_tier: false }
    );
    let snapshot = driver.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Countdown);
    assert_eq!(snapshot.balance, 9);
}

#[tokio::test(start_paused = true)]
async fn test_early_close_gives_next_countdown_full_delay() {
    let cfg = CycleConfig::new(2, 2, 5, 0.0, 0).unwrap().with_close_on_capture(true);
    let (driver, mut rx) = spawn(cfg, 5);

    next_matching(&mut rx, |e| matches!(e, PulseEvent::WindowOpened { .. })).await;
    tokio::time::sleep(Duration::from_millis(900)).await;

    let closed_at = Instant::now();
    assert!(driver.attempt_capture().await.unwrap().is_accepted());
    let reopened =
        next_matching(&mut rx, |e| matches!(e, PulseEvent::WindowOpened { .. })).await;
    assert_eq!(
        reopened,
        PulseEvent::WindowOpened { window_id: 2, is_rare_tier: false, window_duration: 5 }
    );
    assert_eq!(closed_at.elapsed(), 2 * SECOND);
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_switches_cadence() {
    let (driver, _rx) = spawn(CycleConfig::standard(), 0);
    driver.reconfigure(CycleConfig::demo()).await.unwrap();
    let snapshot = driver.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Countdown);
    assert_eq!(snapshot.remaining, 15);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_event_stream() {
    let (driver, mut rx) = spawn(CycleConfig::demo(), 3);
    let last = driver.shutdown().await.unwrap();
    assert_eq!(last.balance, 3);
    // The engine and its hooks are gone once the task ends.
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_driver_stops_ticking() {
    let cfg = CycleConfig::new(2, 2, 2, 0.0, 0).unwrap();
    let (driver, mut rx) = spawn(cfg, 0);
    next_matching(&mut rx, |e| matches!(e, PulseEvent::Tick { .. })).await;
    drop(driver);
    tokio::time::sleep(10 * SECOND).await;
    // Anything still buffered predates the drop; the stream then ends.
    while let Some(event) = rx.recv().await {
        assert!(!matches!(event, PulseEvent::WindowClosed { .. }));
    }
}
