//! Read-only inspection and forced clearing of a lock, from outside the
//! process that holds it.

use super::handle::evaluator_for;
use crate::clock;
use crate::config::LockConfig;
use crate::error::{AppLockError, Result};
use crate::medium::{self, LockMedium};
use crate::record;
use crate::staleness::{Staleness, StalenessEvaluator, effective_heartbeat};
use serde::Serialize;
use tracing::debug;

/// Snapshot of a lock record as seen by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub location: String,
    pub medium: String,
    pub owner_pid: u32,
    pub title: Option<String>,
    pub creation_time: i64,
    /// Effective heartbeat (ms since epoch), after resolving the `0` sentinel.
    pub heartbeat_time: i64,
    pub age_ms: i64,
    pub request: bool,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
}

/// Inspect the lock for `name` without changing it.
///
/// Returns `None` when there is no lock or its record is unreadable.
pub fn inspect(name: &str, config: &LockConfig) -> Result<Option<LockStatus>> {
    require_name(name)?;
    config.validate()?;

    let mut medium = medium::medium_for(name, config)?;
    let evaluator = evaluator_for(config, None);
    inspect_medium(medium.as_mut(), &evaluator, clock::timestamp())
}

/// Inspect an explicit medium at `now_ms`. The medium is left closed.
pub fn inspect_medium(
    medium: &mut dyn LockMedium,
    evaluator: &StalenessEvaluator,
    now_ms: i64,
) -> Result<Option<LockStatus>> {
    if !medium.open_existing(false)? {
        return Ok(None);
    }

    let read = medium.read();
    let modified = medium.modified_ms();
    medium.close(false)?;

    let Some(existing) = record::decode_lenient(&read?) else {
        debug!(location = %medium.location(), "lock record unreadable");
        return Ok(None);
    };

    let heartbeat = effective_heartbeat(&existing, modified);
    let staleness = evaluator.evaluate(&existing, heartbeat, now_ms);
    let stale_reason = match staleness {
        Staleness::Stale(reason) => Some(reason.to_string()),
        Staleness::Active => None,
    };

    Ok(Some(LockStatus {
        location: medium.location(),
        medium: medium.kind().as_str().to_string(),
        owner_pid: existing.owner_pid(),
        title: existing.title().map(str::to_string),
        creation_time: existing.creation_time(),
        heartbeat_time: heartbeat,
        age_ms: now_ms.saturating_sub(heartbeat),
        request: existing.request(),
        stale: staleness.is_stale(),
        stale_reason,
    }))
}

/// Remove the lock for `name`, whoever holds it.
///
/// Returns whether a lock existed. A running primary is not told; it notices
/// on its next heartbeat and writes its record back.
pub fn clear(name: &str, config: &LockConfig) -> Result<bool> {
    require_name(name)?;

    let mut medium = medium::medium_for(name, config)?;
    clear_medium(medium.as_mut())
}

/// Remove an explicit medium. Returns whether it existed.
pub fn clear_medium(medium: &mut dyn LockMedium) -> Result<bool> {
    if !medium.open_existing(false)? {
        return Ok(false);
    }
    medium.close(true)?;
    debug!(location = %medium.location(), "cleared lock");
    Ok(true)
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppLockError::MissingName);
    }
    Ok(())
}
