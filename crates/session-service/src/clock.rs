//! Time source for token issuance and expiry checks.
//!
//! Every expiry decision in the service (JWT `exp`, in-memory store TTLs)
//! reads time through [`Clock`] so tests can move time forward without
//! sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of the current Unix timestamp in seconds.
pub trait Clock: Send + Sync {
    /// Current Unix epoch seconds.
    fn now(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for tests.
///
/// Starts at a fixed timestamp and only moves when [`MockClock::advance`] or
/// [`MockClock::set`] is called.
#[derive(Debug)]
pub struct MockClock {
    now: AtomicI64,
}

impl MockClock {
    /// Create a clock frozen at `start` (Unix epoch seconds).
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Create a clock frozen at the current wall-clock time.
    ///
    /// Tokens issued under this clock stay decodable by tools that check
    /// expiry against real time.
    pub fn starting_now() -> Self {
        Self::new(chrono::Utc::now().timestamp())
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let secs = i64::try_from(by.as_secs()).unwrap_or(i64::MAX);
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, timestamp: i64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
