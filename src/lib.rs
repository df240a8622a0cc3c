//! applock: single-instance coordination for applications.
//!
//! The first process to acquire a lock name becomes the *primary* and keeps
//! a heartbeat record fresh in a shared medium (POSIX shared memory for the
//! global scope, a lock file for user and session scopes). Later processes
//! find the record, judge whether its holder is still alive, and either
//! reclaim it or become *secondaries* that leave a request flag for the
//! primary and step aside.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod identity;
pub mod medium;
pub mod record;
pub mod scheduler;
pub mod staleness;

#[cfg(test)]
mod test_support;

pub use config::{LockConfig, MediumKind, Scope};
pub use coordinator::{InstanceLock, InstanceLockBuilder, LockEvent, LockState, LockStatus, Role};
pub use error::{AppLockError, Result};
pub use record::LockRecord;
