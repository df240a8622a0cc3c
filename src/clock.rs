//! Wall-clock source for heartbeats.
//!
//! All lock timestamps are integer milliseconds since the Unix epoch.

use chrono::Utc;

/// Source of the current time in ms since epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        timestamp()
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn timestamp() -> i64 {
    Utc::now().timestamp_millis()
}
