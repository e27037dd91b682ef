//! Wall-clock abstraction and timestamp helpers.
//!
//! Every timestamp in the engine is milliseconds since the Unix epoch. The
//! clock is injected so the sync layer can be driven deterministically in
//! tests.

use crate::Timestamp;
use chrono::{DateTime, NaiveDate};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now".
pub trait Clock: Send + Sync + Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// The system clock, optionally corrected by a known offset to a trusted
/// time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    offset_ms: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock shifted by `offset_ms` (positive when the local clock runs slow).
    pub fn with_offset(offset_ms: i64) -> Self {
        Self { offset_ms }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let local = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        local.saturating_add(self.offset_ms).max(0) as Timestamp
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Next modification stamp: never earlier than the previous one.
pub fn stamp(previous: Timestamp, now: Timestamp) -> Timestamp {
    previous.max(now)
}

/// UTC calendar day containing `ts`.
pub fn calendar_day(ts: Timestamp) -> NaiveDate {
    DateTime::from_timestamp_millis(ts as i64)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}
