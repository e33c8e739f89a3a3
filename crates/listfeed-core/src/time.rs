//! Wall-clock timestamps and injectable clocks
//!
//! The item creation command never reads system time directly; it asks a
//! [`Clock`]. Production uses [`SystemClock`], tests and demos use
//! [`ManualClock`] so that timestamps are deterministic.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp from epoch milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Epoch milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Day number since the epoch (UTC), used for day sectioning.
    pub fn epoch_day(&self) -> u64 {
        self.0 / 86_400_000
    }

    /// UTC date-time, if representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Source of "now".
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        Timestamp(u64::try_from(ms).unwrap_or(u64::MAX))
    }
}

/// Deterministic clock for tests and demos.
///
/// With a non-zero tick every read advances the clock, so consecutive
/// records get strictly increasing timestamps.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<u64>>,
    tick_ms: u64,
}

impl ManualClock {
    /// Frozen clock at the given time.
    pub fn new(start_ms: u64) -> Self {
        Self::with_tick(start_ms, 0)
    }

    /// Clock that advances by `tick_ms` after every read.
    pub fn with_tick(start_ms: u64, tick_ms: u64) -> Self {
        Self {
            current: Arc::new(Mutex::new(start_ms)),
            tick_ms,
        }
    }

    /// Advance by the given number of milliseconds.
    pub fn advance(&self, ms: u64) {
        *self.current.lock() += ms;
    }

    /// Set the absolute time.
    pub fn set(&self, ms: u64) {
        *self.current.lock() = ms;
    }

    /// Peek without ticking.
    pub fn peek(&self) -> Timestamp {
        Timestamp(*self.current.lock())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let mut current = self.current.lock();
        let now = *current;
        *current += self.tick_ms;
        Timestamp(now)
    }
}
