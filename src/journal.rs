//! Append-only capture journal (JSON lines).
//!
//! The engine never touches the journal; binaries append settlements,
//! credits and missed windows as they observe them, and `recover` rebuilds
//! the balance and capture history on the next start.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{CaptureAttempt, PulseEvent, Tier};
use crate::logging::ts_epoch_ms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum JournalEntry {
    Settlement {
        ts: u64,
        window_id: u64,
        tier: Tier,
        cost: u64,
        balance_after: u64,
    },
    Credit {
        ts: u64,
        amount: u64,
        balance_after: u64,
    },
    Missed {
        ts: u64,
        window_id: u64,
        tier: Tier,
    },
}

impl JournalEntry {
    /// Entry for an accepted capture; rejected attempts are not journaled.
    pub fn settlement(attempt: &CaptureAttempt) -> Option<Self> {
        if !attempt.is_accepted() {
            return None;
        }
        Some(JournalEntry::Settlement {
            ts: ts_epoch_ms(),
            window_id: attempt.window_id,
            tier: attempt.tier?,
            cost: attempt.cost,
            balance_after: attempt.balance_after,
        })
    }

    pub fn credit(amount: u64, balance_after: u64) -> Self {
        JournalEntry::Credit {
            ts: ts_epoch_ms(),
            amount,
            balance_after,
        }
    }

    /// Entry for a window that closed uncaptured.
    pub fn missed(event: &PulseEvent) -> Option<Self> {
        match *event {
            PulseEvent::WindowClosed {
                window_id,
                was_captured: false,
                is_rare_tier,
            } => Some(JournalEntry::Missed {
                ts: ts_epoch_ms(),
                window_id,
                tier: Tier::from_rare(is_rare_tier),
            }),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
}

impl Journal {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, entry: &JournalEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()
    }

    /// Reads every parsable entry in file order. A missing file is empty.
    pub fn replay(path: impl AsRef<Path>) -> std::io::Result<Vec<JournalEntry>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(vec![]);
        }
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // Torn or foreign lines are skipped.
            if let Ok(entry) = serde_json::from_str::<JournalEntry>(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn recover(path: impl AsRef<Path>) -> std::io::Result<Recovery> {
        Ok(Recovery::from_entries(&Self::replay(path)?))
    }
}

/// One settled capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub ts: u64,
    pub window_id: u64,
    pub tier: Tier,
    pub cost: u64,
}

/// State rebuilt from a journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Balance after the last settlement or credit, if any.
    pub balance: Option<u64>,
    /// Newest first.
    pub captures: Vec<CaptureRecord>,
    pub missed: u64,
    pub credited: u64,
}

impl Recovery {
    pub fn from_entries(entries: &[JournalEntry]) -> Self {
        let mut recovery = Recovery::default();
        for entry in entries {
            match *entry {
                JournalEntry::Settlement {
                    ts,
                    window_id,
                    tier,
                    cost,
                    balance_after,
                } => {
                    recovery.balance = Some(balance_after);
                    recovery.captures.push(CaptureRecord {
                        ts,
                        window_id,
                        tier,
                        cost,
                    });
                }
                JournalEntry::Credit {
                    amount,
                    balance_after,
                    ..
                } => {
                    recovery.balance = Some(balance_after);
                    recovery.credited = recovery.credited.saturating_add(amount);
                }
                JournalEntry::Missed { .. } => recovery.missed += 1,
            }
        }
        recovery.captures.reverse();
        recovery
    }

    /// The newest `n` captures.
    pub fn recent(&self, n: usize) -> &[CaptureRecord] {
        &self.captures[..n.min(self.captures.len())]
    }

    pub fn total_spent(&self) -> u64 {
        self.captures.iter().map(|c| c.cost).sum()
    }
}
