//! Periodic, fingerprint-deduplicated snapshots.
//!
//! The scheduler is driven by an external one-second tick:
//!
//! ```text
//! Idle ──enable──▶ Counting ──remaining hits 0──▶ Due ──▶ Snapshot ──▶ Counting
//!                     ▲                              │ blank / unchanged   │
//!                     └──────────── re-arm ◀─────────┴─────────────────────┘
//! ```
//!
//! A `Due` tick writes a snapshot only when the buffer has visible content
//! and its fingerprint differs from the last snapshot written. That baseline
//! is separate from the save baseline kept by the session.

use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use quillsafe_config::{Config, DEFAULT_BACKUP_MINUTES};

use crate::codec::{self, CodecError};
use crate::editing::{Fingerprint, StyleRunBuffer};
use crate::io::{BackupSet, RenameReport};
use crate::models::DocumentId;

/// One tick per second
pub const TICKS_PER_MINUTE: u32 = 60;

/// Longest interval whose tick count still fits the countdown
pub const MAX_INTERVAL_MINUTES: u32 = u32::MAX / TICKS_PER_MINUTE;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Backup set name is empty")]
    EmptyName,
    #[error("Failed to create backup directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Parse a whole number of minutes in `1..=MAX_INTERVAL_MINUTES`; anything
/// else is `None`.
pub fn parse_interval_minutes(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u32>()
        .ok()
        .filter(|minutes| (1..=MAX_INTERVAL_MINUTES).contains(minutes))
}

/// Zero means the default; anything too long for the countdown is capped.
fn effective_minutes(minutes: u32) -> u32 {
    if minutes == 0 {
        DEFAULT_BACKUP_MINUTES
    } else {
        minutes.min(MAX_INTERVAL_MINUTES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Counting { remaining: u32 },
}

#[derive(Debug)]
pub enum TickOutcome {
    Idle,
    Counting(u32),
    Written(PathBuf),
    SkippedBlank,
    SkippedUnchanged,
    /// The countdown was re-armed anyway
    Failed(BackupError),
}

/// What a snapshot is taken of
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSource<'a> {
    pub buffer: &'a StyleRunBuffer,
    pub identity: &'a DocumentId,
    /// Current display name; selects the backup set
    pub name: &'a str,
}

/// Remaining time until the next backup, shown as `MM:SS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub minutes: u32,
    pub seconds: u32,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

#[derive(Debug)]
pub struct BackupScheduler {
    store: BackupSet,
    interval_minutes: u32,
    remaining: u32,
    enabled: bool,
    last_backup: Option<Fingerprint>,
}

impl BackupScheduler {
    pub fn new(store: BackupSet, interval_minutes: u32, enabled: bool) -> Self {
        let interval_minutes = effective_minutes(interval_minutes);
        Self {
            store,
            interval_minutes,
            remaining: interval_minutes.saturating_mul(TICKS_PER_MINUTE),
            enabled,
            last_backup: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BackupSet::new(config.backups_dir(), &config.snapshot_extension),
            config.default_backup_minutes,
            config.periodic_backups,
        )
    }

    pub fn store(&self) -> &BackupSet {
        &self.store
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Set the interval and restart the countdown; zero means the default
    /// and values above [`MAX_INTERVAL_MINUTES`] are capped.
    pub fn set_interval(&mut self, minutes: u32) {
        self.interval_minutes = effective_minutes(minutes);
        self.rearm();
    }

    /// Interval as typed by the user; invalid text resets to the default.
    /// Returns the interval now in effect.
    pub fn set_interval_text(&mut self, text: &str) -> u32 {
        let minutes = parse_interval_minutes(text).unwrap_or_else(|| {
            log::debug!("Invalid backup interval {text:?}, using {DEFAULT_BACKUP_MINUTES}");
            DEFAULT_BACKUP_MINUTES
        });
        self.set_interval(minutes);
        minutes
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pausing keeps the remaining time; resuming continues from it.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn state(&self) -> SchedulerState {
        if self.enabled {
            SchedulerState::Counting {
                remaining: self.remaining,
            }
        } else {
            SchedulerState::Idle
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn countdown(&self) -> Countdown {
        Countdown {
            minutes: self.remaining / TICKS_PER_MINUTE,
            seconds: self.remaining % TICKS_PER_MINUTE,
        }
    }

    pub fn last_backup(&self) -> Option<&Fingerprint> {
        self.last_backup.as_ref()
    }

    /// Forget the last snapshot so the next due tick writes again
    pub fn reset_baseline(&mut self) {
        self.last_backup = None;
    }

    pub fn tick(&mut self, source: SnapshotSource<'_>) -> TickOutcome {
        self.tick_at(source, Local::now().naive_local())
    }

    pub fn tick_at(&mut self, source: SnapshotSource<'_>, now: NaiveDateTime) -> TickOutcome {
        if !self.enabled {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return TickOutcome::Counting(self.remaining);
        }
        self.fire(source, now)
    }

    /// Run the due step now and re-arm, whatever the countdown says
    pub fn fire(&mut self, source: SnapshotSource<'_>, now: NaiveDateTime) -> TickOutcome {
        let outcome = self.snapshot(source, now);
        self.rearm();
        outcome
    }

    pub fn rename_sync(&self, old: &str, new: &str) -> RenameReport {
        self.store.rename_sync(old, new)
    }

    fn rearm(&mut self) {
        self.remaining = self.interval_minutes.saturating_mul(TICKS_PER_MINUTE);
    }

    fn snapshot(&mut self, source: SnapshotSource<'_>, now: NaiveDateTime) -> TickOutcome {
        if source.buffer.is_blank() {
            log::debug!("Skipping backup of {:?}: nothing to save", source.name);
            return TickOutcome::SkippedBlank;
        }
        let fingerprint = Fingerprint::snapshot(source.buffer);
        if self.last_backup.as_ref() == Some(&fingerprint) {
            log::debug!("Skipping backup of {:?}: unchanged", source.name);
            return TickOutcome::SkippedUnchanged;
        }

        let document = codec::encode(source.buffer, source.identity, self.interval_minutes);
        match self.store.write_snapshot(source.name, &document, now) {
            Ok(path) => {
                log::info!("Auto-backup saved: {}", path.display());
                self.last_backup = Some(fingerprint);
                TickOutcome::Written(path)
            }
            Err(e) => {
                log::warn!("Auto-backup of {:?} failed: {e}", source.name);
                TickOutcome::Failed(e)
            }
        }
    }
}
