//! In-process lock medium.
//!
//! A [`MemoryStore`] plays the role of the OS object; each [`MemoryMedium`]
//! obtained from it behaves like one process's handle. The store can be
//! told to refuse writes or creation to exercise failure paths.

use super::LockMedium;
use crate::config::MediumKind;
use crate::error::{AppLockError, Result};
use crate::record::{self, LockRecord};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared backing storage for [`MemoryMedium`] handles.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    bytes: Option<Vec<u8>>,
    modified_ms: Option<i64>,
    read_only: bool,
    fail_create: bool,
    /// Bumped on every removal, so segment-like handles can tell a
    /// recreated record from the one they opened.
    generation: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that cannot be created twice, like shared memory.
    pub fn medium(&self) -> MemoryMedium {
        MemoryMedium {
            store: self.clone(),
            access: None,
            generation: 0,
            tracks_mtime: false,
        }
    }

    /// A handle whose modification time stands in for the heartbeat, like a
    /// lock file.
    pub fn medium_with_mtime(&self) -> MemoryMedium {
        MemoryMedium {
            tracks_mtime: true,
            ..self.medium()
        }
    }

    pub fn exists(&self) -> bool {
        self.state().bytes.is_some()
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.state().bytes.clone()
    }

    /// The stored record, if the contents decode.
    pub fn record(&self) -> Option<LockRecord> {
        self.contents().and_then(|bytes| record::decode_lenient(&bytes))
    }

    /// Store raw bytes, as if another process had written them.
    pub fn put(&self, bytes: Vec<u8>) {
        self.state().bytes = Some(bytes);
    }

    /// Store an encoded record, as if another process had written it.
    pub fn put_record(&self, record: &LockRecord) -> Result<()> {
        self.put(record::encode(record)?);
        Ok(())
    }

    pub fn modified_ms(&self) -> Option<i64> {
        self.state().modified_ms
    }

    pub fn set_modified_ms(&self, modified_ms: Option<i64>) {
        self.state().modified_ms = modified_ms;
    }

    /// Refuse every write from now on.
    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
    }

    /// Refuse creation from now on, as on permission errors.
    pub fn set_fail_create(&self, fail_create: bool) {
        self.state().fail_create = fail_create;
    }

    pub fn remove(&self) {
        let mut state = self.state();
        state.bytes = None;
        state.modified_ms = None;
        state.generation += 1;
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// One handle on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryMedium {
    store: MemoryStore,
    access: Option<bool>,
    generation: u64,
    tracks_mtime: bool,
}

impl MemoryMedium {
    fn require_writable(&self) -> Result<()> {
        match self.access {
            Some(true) => Ok(()),
            Some(false) => Err(AppLockError::Medium(
                "memory lock is open read-only".to_string(),
            )),
            None => Err(AppLockError::Medium("memory lock is not open".to_string())),
        }
    }
}

impl LockMedium for MemoryMedium {
    fn kind(&self) -> MediumKind {
        MediumKind::Memory
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn create(&mut self) -> Result<()> {
        if self.access.is_some() {
            return Err(AppLockError::InvalidState(
                "memory lock is already open".to_string(),
            ));
        }

        let mut state = self.store.state();
        if state.fail_create {
            return Err(AppLockError::MediumCreate(
                "memory lock creation refused".to_string(),
            ));
        }
        // File-like handles truncate; segment-like handles cannot be created twice.
        if state.bytes.is_some() && !self.tracks_mtime {
            return Err(AppLockError::AlreadyExists("memory".to_string()));
        }
        state.bytes = Some(Vec::new());
        self.generation = state.generation;
        drop(state);

        self.access = Some(true);
        Ok(())
    }

    fn open_existing(&mut self, writable: bool) -> Result<bool> {
        let state = self.store.state();
        if state.bytes.is_none() {
            return Ok(false);
        }
        if writable && state.read_only {
            return Err(AppLockError::Medium(
                "memory lock refuses writers".to_string(),
            ));
        }
        self.generation = state.generation;
        drop(state);

        self.access = Some(writable);
        Ok(true)
    }

    fn read(&self) -> Result<Vec<u8>> {
        if self.access.is_none() {
            return Err(AppLockError::Medium("memory lock is not open".to_string()));
        }
        Ok(self.store.contents().unwrap_or_default())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.require_writable()?;

        let mut state = self.store.state();
        if state.read_only {
            return Err(AppLockError::Medium(
                "memory lock refuses writers".to_string(),
            ));
        }
        state.bytes = Some(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self, cleanup: bool) -> Result<()> {
        self.access = None;
        if cleanup {
            self.store.remove();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.access.is_some()
    }

    fn is_current(&self) -> Result<bool> {
        if self.tracks_mtime {
            return Ok(true);
        }
        let state = self.store.state();
        Ok(self.access.is_some() && state.bytes.is_some() && state.generation == self.generation)
    }

    fn tracks_modification_time(&self) -> bool {
        self.tracks_mtime
    }

    fn modified_ms(&self) -> Option<i64> {
        if self.tracks_mtime {
            self.store.state().modified_ms
        } else {
            None
        }
    }

    fn touch(&mut self, now_ms: i64) -> Result<()> {
        if self.tracks_mtime {
            self.require_writable()?;
            self.store.set_modified_ms(Some(now_ms));
        }
        Ok(())
    }
}
