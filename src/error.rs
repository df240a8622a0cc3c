//! Error types for applock.
//!
//! Uses thiserror for derive macros. Expected outcomes such as "the lock is
//! already held" are not errors; they surface as a [`crate::Role`].

use crate::exit_codes;
use thiserror::Error;

/// Main error type for applock operations.
#[derive(Error, Debug)]
pub enum AppLockError {
    /// The lock was constructed without an application name.
    #[error("missing unique application name")]
    MissingName,

    /// Bad command-line usage.
    #[error("{0}")]
    Usage(String),

    /// Invalid configuration values or unparsable config file.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The create primitive found a medium that already exists.
    ///
    /// Raised by shared memory when another process won the create race.
    /// The coordinator recovers from it by opening the existing medium.
    #[error("lock medium already exists: {0}")]
    AlreadyExists(String),

    /// The medium could not be created or the initial record not persisted.
    #[error("could not become primary: {0}")]
    MediumCreate(String),

    /// Any other medium I/O failure.
    #[error("lock medium error: {0}")]
    Medium(String),

    /// Encoded bytes do not form a complete lock record.
    #[error("invalid lock record: {0}")]
    InvalidRecord(String),

    /// The operation is not valid in the coordinator's current state.
    #[error("invalid lock state: {0}")]
    InvalidState(String),

    /// The heartbeat scheduler could not be started.
    #[error("heartbeat scheduler error: {0}")]
    Scheduler(String),

    /// The requested medium is not available on this platform.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl AppLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppLockError::MissingName
            | AppLockError::Usage(_)
            | AppLockError::Config(_)
            | AppLockError::InvalidState(_)
            | AppLockError::Unsupported(_) => exit_codes::USER_ERROR,
            AppLockError::AlreadyExists(_)
            | AppLockError::MediumCreate(_)
            | AppLockError::Medium(_)
            | AppLockError::InvalidRecord(_)
            | AppLockError::Scheduler(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for applock operations.
pub type Result<T> = std::result::Result<T, AppLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_are_user_errors() {
        assert_eq!(AppLockError::MissingName.exit_code(), exit_codes::USER_ERROR);
        assert_eq!(
            AppLockError::Config("bad".to_string()).exit_code(),
            exit_codes::USER_ERROR
        );
    }

    #[test]
    fn medium_errors_are_lock_failures() {
        let err = AppLockError::MediumCreate("permission denied".to_string());
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);

        let err = AppLockError::Medium("read failed".to_string());
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn error_messages_are_descriptive() {
        assert_eq!(
            AppLockError::MissingName.to_string(),
            "missing unique application name"
        );

        let err = AppLockError::MediumCreate("disk full".to_string());
        assert_eq!(err.to_string(), "could not become primary: disk full");
    }
}
