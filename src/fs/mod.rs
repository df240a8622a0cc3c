//! Filesystem utilities for applock.
//!
//! The file lock medium never writes its target in place; it goes through
//! [`atomic_write`] so readers see either the previous or the next record.

pub mod atomic;

pub use atomic::atomic_write;
