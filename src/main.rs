//! Interactive pulse terminal.
//!
//! Commands (one per line on stdin):
//!   c  capture the open pulse
//!   b  buy credits
//!   r  reset the cycle
//!   g  reset, closing an open pulse first
//!   d  toggle the demo cadence
//!   s  print a status snapshot
//!   q  quit

use std::io::Write;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use market_pulse::config::RunConfig;
use market_pulse::driver::{ChannelHooks, PulseDriver};
use market_pulse::engine::{format_mm_ss, Phase, PulseEngine, PulseEvent, RngSource};
use market_pulse::journal::{Journal, JournalEntry};
use market_pulse::logging::{log, obj, v_str, Domain, Level};
use market_pulse::notice::Notice;

fn print_help() {
    println!("commands: [c]apture [b]uy [r]eset [g]raceful reset [d]emo toggle [s]tatus [q]uit");
}

fn render_event(event: &PulseEvent) {
    if let PulseEvent::Tick { phase, remaining } = event {
        let label = match phase {
            Phase::Open => "PULSE ACTIVE",
            _ => "next pulse in",
        };
        print!("\r{} {}   ", label, format_mm_ss(*remaining));
        let _ = std::io::stdout().flush();
        return;
    }
    if let Some(notice) = Notice::for_event(event) {
        println!("\r{}", notice);
    }
}

fn record(journal: &mut Option<Journal>, entry: Option<JournalEntry>) -> Result<()> {
    if let (Some(journal), Some(entry)) = (journal.as_mut(), entry) {
        journal
            .append(&entry)
            .with_context(|| format!("append to journal {}", journal.path().display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = RunConfig::from_env();
    let cycle = cfg.cycle().context("invalid pulse configuration")?;
    let mut demo = cfg.demo;

    let mut balance = cfg.start_balance;
    let mut journal = None;
    if let Some(path) = &cfg.journal_path {
        let recovery = Journal::recover(path)
            .with_context(|| format!("replay journal {}", path.display()))?;
        if let Some(recovered) = recovery.balance {
            balance = recovered;
        }
        log(
            Level::Info,
            Domain::System,
            "journal_recovered",
            obj(&[
                ("path", v_str(&path.to_string_lossy())),
                ("balance", json!(balance)),
                ("captures", json!(recovery.captures.len())),
                ("missed", json!(recovery.missed)),
                ("spent", json!(recovery.total_spent())),
                ("credited", json!(recovery.credited)),
            ]),
        );
        for capture in recovery.recent(3) {
            println!(
                "recent capture: window {} ({}, {} credits)",
                capture.window_id,
                capture.tier.as_str(),
                capture.cost
            );
        }
        journal = Some(
            Journal::open(path).with_context(|| format!("open journal {}", path.display()))?,
        );
    }

    let rng = match cfg.seed {
        Some(seed) => RngSource::seeded(seed),
        None => RngSource::from_entropy(),
    };
    let (hooks, mut events) = ChannelHooks::channel();
    let engine = PulseEngine::with_hooks(cycle, rng, balance, hooks);
    let driver = PulseDriver::spawn(engine, cfg.tick_period());

    println!("balance: {} credits", balance);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                render_event(&event);
                record(&mut journal, JournalEntry::missed(&event))?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else { break };
                match line.trim() {
                    "c" => {
                        let attempt = driver.attempt_capture().await?;
                        println!("\r{}", Notice::for_attempt(&attempt));
                        record(&mut journal, JournalEntry::settlement(&attempt))?;
                    }
                    "b" => match driver.credit_balance(cfg.topup).await? {
                        Ok(balance_after) => {
                            println!("\r{}", Notice::for_credit(cfg.topup));
                            record(&mut journal, Some(JournalEntry::credit(cfg.topup, balance_after)))?;
                        }
                        Err(err) => println!("\rcredit rejected: {}", err),
                    },
                    "r" => driver.reset().await?,
                    "g" => driver.graceful_reset().await?,
                    "d" => match cfg.cycle_with_demo(!demo) {
                        Ok(next) => {
                            demo = !demo;
                            driver.reconfigure(next).await?;
                            println!("\rdemo cadence {}", if demo { "on" } else { "off" });
                        }
                        Err(err) => println!("\rcadence unchanged: {}", err),
                    },
                    "s" => {
                        let snapshot = driver.snapshot().await?;
                        println!("\r{}", serde_json::to_string(&snapshot)?);
                    }
                    "q" => break,
                    "" => {}
                    other => {
                        println!("\runknown command: {}", other);
                        print_help();
                    }
                }
            }
        }
    }

    let last = driver.shutdown().await?;
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("balance", json!(last.balance)),
            ("cycles_completed", json!(last.cycles_completed)),
            ("windows", json!(last.window_id)),
        ]),
    );
    Ok(())
}
