//! Command implementations for applock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the config resolution they share.

mod clear;
mod hold;
mod status;

use crate::cli::{Command, LockArgs};
use applock::{AppLockError, LockConfig, Result, Scope};

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Hold(args) => hold::cmd_hold(args),
        Command::Status(args) => status::cmd_status(args),
        Command::Clear(args) => clear::cmd_clear(args),
    }
}

/// Load the config file (if any), then apply the `--scope` override.
fn resolve_config(args: &LockArgs) -> Result<LockConfig> {
    let mut config = match &args.config {
        Some(path) => LockConfig::load(path)?,
        None => LockConfig::default(),
    };

    if let Some(scope) = &args.scope {
        config.scope = Scope::from_str(scope).ok_or_else(|| {
            AppLockError::Usage(format!(
                "invalid scope '{}': expected global, user or session",
                scope
            ))
        })?;
    }

    config.validate()?;
    Ok(config)
}

/// Render an age in ms as a short human string.
fn format_age(age_ms: i64) -> String {
    let seconds = age_ms.max(0) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lock_args(scope: Option<&str>, config: Option<std::path::PathBuf>) -> LockArgs {
        LockArgs {
            name: "my-editor".to_string(),
            scope: scope.map(str::to_string),
            config,
        }
    }

    #[test]
    fn resolve_config_defaults() {
        let config = resolve_config(&lock_args(None, None)).unwrap();
        assert_eq!(config, LockConfig::default());
    }

    #[test]
    fn resolve_config_scope_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("applock.yaml");
        fs::write(&path, "scope: global\nstale_timeout_ms: 5000\n").unwrap();

        let config = resolve_config(&lock_args(Some("session"), Some(path))).unwrap();
        assert_eq!(config.scope, Scope::Session);
        assert_eq!(config.stale_timeout_ms, 5_000);
    }

    #[test]
    fn resolve_config_rejects_unknown_scope() {
        let err = resolve_config(&lock_args(Some("planet"), None)).unwrap_err();
        assert!(matches!(err, AppLockError::Usage(_)));
        assert!(err.to_string().contains("planet"));
    }

    #[test]
    fn resolve_config_validates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("applock.yaml");
        fs::write(&path, "stale_timeout_ms: 100\nheartbeat_interval_ms: 100\n").unwrap();

        let err = resolve_config(&lock_args(None, Some(path))).unwrap_err();
        assert!(matches!(err, AppLockError::Config(_)));
    }

    #[test]
    fn format_age_units() {
        assert_eq!(format_age(0), "0s");
        assert_eq!(format_age(-500), "0s");
        assert_eq!(format_age(2_500), "2s");
        assert_eq!(format_age(125_000), "2m 5s");
        assert_eq!(format_age(3_660_000), "1h 1m");
    }
}
