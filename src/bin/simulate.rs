//! Headless simulation of many pulse cycles with a scripted user.
//!
//! Runs the engine tick by tick with a seeded source, checks the cycle
//! invariants after every tick, and prints a JSON summary.
//!
//! Usage: SIM_CYCLES=10000 SIM_SEED=7 cargo run --release --bin simulate

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use market_pulse::config::RunConfig;
use market_pulse::engine::invariants::{check_state, SequenceChecker};
use market_pulse::engine::{PulseEngine, PulseEvent, Recorder, RngSource};
use market_pulse::logging::{log, obj, v_num, Domain, Level};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn main() -> Result<()> {
    let run = RunConfig::from_env();
    let cycle = run.cycle().context("invalid pulse configuration")?;
    let cycles: u64 = env_or("SIM_CYCLES", 10_000);
    let seed: u64 = env_or("SIM_SEED", run.seed.unwrap_or(42));
    let capture_rate: f64 = env_or("SIM_CAPTURE_RATE", 0.7);
    let reaction: u32 = env_or("SIM_REACTION", 2);

    let mut engine = PulseEngine::with_hooks(
        cycle,
        RngSource::seeded(seed),
        run.start_balance,
        Recorder::default(),
    );
    let mut user = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut checker = SequenceChecker::new(&cycle);

    let mut ticks: u64 = 0;
    let mut attempts: u64 = 0;
    let mut captures: u64 = 0;
    let mut topups: u64 = 0;
    let mut rejections: BTreeMap<&'static str, u64> = BTreeMap::new();
    // Ticks since the current window opened, None outside a window.
    let mut open_for: Option<u32> = None;
    let mut will_try = false;

    let started = Instant::now();
    while engine.state().cycles_completed < cycles {
        engine.tick();
        // Drains the tick's events plus any early close from the previous
        // capture.
        for event in engine.hooks_mut().take() {
            checker
                .observe(&event)
                .with_context(|| format!("tick {}", ticks))?;
            match event {
                PulseEvent::WindowOpened { .. } => {
                    open_for = Some(0);
                    will_try = user.gen::<f64>() < capture_rate;
                }
                PulseEvent::WindowClosed { .. } => open_for = None,
                _ => {}
            }
        }
        check_state(engine.state(), engine.config()).with_context(|| format!("tick {}", ticks))?;
        ticks += 1;

        let Some(elapsed) = open_for.as_mut() else { continue };
        *elapsed += 1;
        if !will_try || *elapsed != reaction {
            continue;
        }

        if engine.balance() < 3 {
            engine.credit_balance(run.topup)?;
            topups += 1;
        }
        attempts += 1;
        let attempt = engine.attempt_capture();
        if attempt.is_accepted() {
            captures += 1;
            // Impatient users press twice.
            if user.gen_bool(0.1) {
                let again = engine.attempt_capture();
                *rejections.entry(again.outcome.as_str()).or_default() += 1;
            }
        } else {
            *rejections.entry(attempt.outcome.as_str()).or_default() += 1;
        }
    }

    for event in engine.hooks_mut().take() {
        checker.observe(&event).context("final drain")?;
    }
    if checker.opened != checker.closed + checker.aborted + u64::from(engine.state().is_open()) {
        anyhow::bail!(
            "unbalanced windows: opened={} closed={} aborted={}",
            checker.opened,
            checker.closed,
            checker.aborted
        );
    }

    let summary = json!({
        "cycles": engine.state().cycles_completed,
        "ticks": ticks,
        "seed": seed,
        "rare_fraction": checker.rare_fraction(),
        "rare_windows": checker.rare,
        "attempts": attempts,
        "captures": captures,
        "topups": topups,
        "rejections": rejections,
        "final_balance": engine.balance(),
        "elapsed_ms": started.elapsed().as_millis() as u64,
    });
    log(
        Level::Info,
        Domain::System,
        "simulation_complete",
        obj(&[
            ("cycles", json!(engine.state().cycles_completed)),
            ("rare_fraction", v_num(checker.rare_fraction())),
        ]),
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
