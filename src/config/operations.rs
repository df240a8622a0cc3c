//! Config loading and validation.

use super::model::LockConfig;
use crate::error::{AppLockError, Result};
use std::path::Path;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppLockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: LockConfig = serde_yaml::from_str(yaml)
            .map_err(|e| AppLockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AppLockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `heartbeat_interval_ms` must be positive
    /// - `stale_timeout_ms` must be at least twice `heartbeat_interval_ms`,
    ///   so a late tick is not mistaken for a dead primary
    /// - `title`, when set, must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(AppLockError::Config(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.stale_timeout_ms < self.heartbeat_interval_ms.saturating_mul(2) {
            return Err(AppLockError::Config(format!(
                "stale_timeout_ms ({}) must be at least twice heartbeat_interval_ms ({})",
                self.stale_timeout_ms, self.heartbeat_interval_ms
            )));
        }

        if let Some(title) = &self.title
            && title.is_empty()
        {
            return Err(AppLockError::Config(
                "title must not be empty when set".to_string(),
            ));
        }

        Ok(())
    }
}
