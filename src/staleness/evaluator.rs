//! Decides whether an existing lock record still has a live holder.

use super::probe::{Liveness, ProcessProbe};
use crate::record::LockRecord;
use std::sync::Arc;
use std::time::Duration;

/// Verdict on an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Active,
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Stale(_))
    }
}

/// Why a record was judged abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The heartbeat is older than the staleness timeout.
    HeartbeatExpired { age_ms: i64 },
    /// The owner process no longer exists.
    OwnerGone { pid: u32 },
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::HeartbeatExpired { age_ms } => {
                write!(f, "heartbeat expired {} ms ago", age_ms)
            }
            StaleReason::OwnerGone { pid } => write!(f, "owner pid {} no longer exists", pid),
        }
    }
}

/// Heartbeat timestamp to judge a record by.
///
/// A `0` heartbeat defers to the medium's modification time; if the medium
/// has none, the creation time is the best remaining evidence.
pub fn effective_heartbeat(record: &LockRecord, modified_ms: Option<i64>) -> i64 {
    match record.heartbeat_time() {
        0 => modified_ms.unwrap_or(record.creation_time()),
        heartbeat => heartbeat,
    }
}

/// Staleness timeout plus an optional liveness probe.
#[derive(Clone)]
pub struct StalenessEvaluator {
    timeout_ms: i64,
    probe: Option<Arc<dyn ProcessProbe>>,
}

impl std::fmt::Debug for StalenessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalenessEvaluator")
            .field("timeout_ms", &self.timeout_ms)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

impl StalenessEvaluator {
    /// Evaluator judging by heartbeat age alone.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX),
            probe: None,
        }
    }

    /// Also consult `probe` about the owner PID.
    pub fn with_probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    pub fn probes_liveness(&self) -> bool {
        self.probe.is_some()
    }

    /// Judge `record` whose effective heartbeat is `heartbeat_ms`, at `now_ms`.
    ///
    /// An unknown probe answer never overrides the age check.
    pub fn evaluate(&self, record: &LockRecord, heartbeat_ms: i64, now_ms: i64) -> Staleness {
        let age_ms = now_ms.saturating_sub(heartbeat_ms);
        if age_ms > self.timeout_ms {
            return Staleness::Stale(StaleReason::HeartbeatExpired { age_ms });
        }

        if let Some(probe) = &self.probe
            && probe.liveness(record.owner_pid()) == Liveness::Dead
        {
            return Staleness::Stale(StaleReason::OwnerGone {
                pid: record.owner_pid(),
            });
        }

        Staleness::Active
    }
}
