//! LockConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an application lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Who the lock excludes: everyone on the host, one user, or one session.
    pub scope: Scope,

    /// Maximum heartbeat age before a record is presumed abandoned.
    #[serde(default = "default_stale_timeout_ms")]
    pub stale_timeout_ms: u64,

    /// Period of the primary's heartbeat tick.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Whether to probe the owner PID for liveness.
    /// When unset, the scope decides (see [`Scope::probes_liveness`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<bool>,

    /// Directory holding lock files. Defaults to the platform temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,

    /// Display label stored in the record. Defaults to `user@host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            scope: Scope::default(),
            stale_timeout_ms: default_stale_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            liveness_probe: None,
            lock_dir: None,
            title: None,
        }
    }
}

impl LockConfig {
    /// Default config for the given scope.
    pub fn with_scope(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Whether the owner PID should be probed, after applying the override.
    pub fn probes_liveness(&self) -> bool {
        self.liveness_probe.unwrap_or(self.scope.probes_liveness())
    }

    /// Directory where lock files live.
    pub fn resolved_lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
