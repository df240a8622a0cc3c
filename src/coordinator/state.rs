//! Coordinator states and outcomes.

use serde::Serialize;

/// Outcome of acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// This process holds and refreshes the lock record.
    Primary,
    /// Another process holds the lock; this one deferred to it.
    Secondary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an [`crate::InstanceLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Uninitialized,
    Acquiring,
    Primary,
    Secondary,
    Closed,
}

impl LockState {
    /// The decided role, if acquisition has completed and the lock is open.
    pub fn role(&self) -> Option<Role> {
        match self {
            LockState::Primary => Some(Role::Primary),
            LockState::Secondary => Some(Role::Secondary),
            _ => None,
        }
    }
}

/// Result of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not primary; nothing to refresh.
    Idle,
    /// Heartbeat refreshed. `requested` is set when a request was delivered.
    Refreshed { requested: bool },
    /// The record now belongs to another process.
    Lost,
}
