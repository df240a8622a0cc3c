//! Configuration types and defaults for applock.

use serde::{Deserialize, Serialize};

/// Visibility scope of an application lock.
///
/// The scope fixes which lock medium is used and whether the owner PID may
/// be probed for liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One instance per host, across all users (shared memory).
    Global,
    /// One instance per user (lock file).
    #[default]
    User,
    /// One instance per user login session (lock file).
    Session,
}

impl Scope {
    /// Parse a scope from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Self::Global),
            "user" => Some(Self::User),
            "session" => Some(Self::Session),
            _ => None,
        }
    }

    /// Name used in config files and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::User => "user",
            Scope::Session => "session",
        }
    }

    /// Whether a PID probe is meaningful in this scope.
    ///
    /// Probing only works when the prober shares the owner's user, which
    /// holds for user and session scopes but not for global ones.
    pub fn probes_liveness(&self) -> bool {
        match self {
            Scope::Global => false,
            Scope::User | Scope::Session => true,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage substrate of a lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumKind {
    /// Named, fixed-size OS shared-memory segment.
    SharedMemory,
    /// Lock file under the lock directory.
    File,
    /// In-process store used by tests and embedders.
    Memory,
}

impl MediumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediumKind::SharedMemory => "shared-memory",
            MediumKind::File => "file",
            MediumKind::Memory => "memory",
        }
    }
}

// Default value functions for serde
pub(crate) fn default_stale_timeout_ms() -> u64 {
    15_000
}
pub(crate) fn default_heartbeat_interval_ms() -> u64 {
    1_000
}
