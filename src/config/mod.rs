//! Configuration model for applock.
//!
//! `LockConfig` describes how an application's lock is scoped and timed.
//! It can be built in code or loaded from YAML; unknown fields are ignored
//! and omitted fields fall back to defaults.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::LockConfig;
pub use types::{MediumKind, Scope};
