//! Lock media: where a lock record lives.
//!
//! Every medium offers the same capability set (create, open an existing
//! record, read, write, close). They differ in how concurrent access is made
//! safe:
//!
//! - [`ShmMedium`] brackets every read and write with an inter-process
//!   exclusive lock, because a segment cannot be replaced atomically.
//! - [`FileMedium`] writes through a temporary file and rename, so a reader
//!   sees either the old or the new record but never a torn one. Its
//!   modification time doubles as the heartbeat.
//! - [`MemoryMedium`] keeps the record in-process; several handles on one
//!   [`MemoryStore`] stand in for several processes in tests.

mod file;
mod memory;
mod naming;
#[cfg(unix)]
mod shm;


pub use file::FileMedium;
pub use memory::{MemoryMedium, MemoryStore};
pub use naming::{lock_file_path, lock_key, shm_object_name};
#[cfg(unix)]
pub use shm::ShmMedium;

use crate::config::{LockConfig, MediumKind, Scope};
use crate::error::Result;
use crate::identity;

/// Storage substrate holding one encoded lock record.
pub trait LockMedium: Send {
    /// Which variant this is.
    fn kind(&self) -> MediumKind;

    /// Human-readable location (path or object name) for logs.
    fn location(&self) -> String;

    /// Create the medium and open it for reading and writing.
    ///
    /// Returns [`crate::AppLockError::AlreadyExists`] when the variant
    /// cannot be created twice and another process already created it.
    fn create(&mut self) -> Result<()>;

    /// Open an existing medium. Returns `Ok(false)` when there is none.
    fn open_existing(&mut self, writable: bool) -> Result<bool>;

    /// Read the full contents. An absent or empty medium reads as no bytes.
    fn read(&self) -> Result<Vec<u8>>;

    /// Replace the contents. Requires the medium to be open for writing.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release this handle. With `cleanup`, also remove the medium itself.
    fn close(&mut self, cleanup: bool) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Whether this handle still refers to the medium its name resolves to.
    ///
    /// A segment stays mapped after another process removes it and may be
    /// replaced by a new one under the same name. Media that resolve their
    /// path on every operation are always current.
    fn is_current(&self) -> Result<bool> {
        Ok(true)
    }

    /// Whether the medium's modification time serves as the heartbeat for
    /// records whose `heartbeat_time` is `0`.
    fn tracks_modification_time(&self) -> bool {
        false
    }

    /// Last modification time in ms since epoch, if the medium has one.
    fn modified_ms(&self) -> Option<i64> {
        None
    }

    /// Set the modification time without rewriting the contents.
    fn touch(&mut self, _now_ms: i64) -> Result<()> {
        Ok(())
    }
}

/// Build the medium for an application lock according to its scope.
pub fn medium_for(name: &str, config: &LockConfig) -> Result<Box<dyn LockMedium>> {
    let key = lock_key(name, &identity::scope_qualifiers(config.scope));

    // A global object crosses user boundaries; per-user file permissions
    // keep the other scopes to the owning user.
    match config.scope {
        Scope::Global => shared_memory(&key),
        Scope::User | Scope::Session => {
            let path = lock_file_path(&config.resolved_lock_dir(), &key);
            Ok(Box::new(FileMedium::new(path)))
        }
    }
}

#[cfg(unix)]
fn shared_memory(key: &str) -> Result<Box<dyn LockMedium>> {
    Ok(Box::new(ShmMedium::new(shm_object_name(key))))
}

#[cfg(not(unix))]
fn shared_memory(_key: &str) -> Result<Box<dyn LockMedium>> {
    Err(crate::error::AppLockError::Unsupported(
        "global scope needs POSIX shared memory; use user or session scope".to_string(),
    ))
}
