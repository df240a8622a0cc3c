//! POSIX shared-memory lock medium.
//!
//! The record lives in a fixed-size segment created with
//! `shm_open(O_CREAT | O_EXCL)` + `ftruncate` + `mmap(MAP_SHARED)`. Every
//! copy in or out holds an exclusive `flock` on the segment for the duration
//! of the copy only. Unmapping leaves the object in place; only
//! `close(cleanup = true)` unlinks it. A mapping outlives an unlink, so a
//! handle compares its object's identity with the name's current object
//! before trusting what it reads.

use super::LockMedium;
use crate::config::MediumKind;
use crate::error::{AppLockError, Result};
use crate::record::SEGMENT_CAPACITY;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg, OFlag};
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd;
use std::fs::{File, Metadata};
use std::num::NonZeroUsize;
use std::os::unix::fs::MetadataExt;
use std::ptr::NonNull;
use tracing::warn;

/// Lock record stored in a named shared-memory segment.
#[derive(Debug)]
pub struct ShmMedium {
    name: String,
    segment: Option<Segment>,
}

/// An open, mapped segment.
#[derive(Debug)]
struct Segment {
    file: File,
    /// `None` when the object is still zero-sized (a peer between
    /// `shm_open` and `ftruncate`).
    map: Option<NonNull<libc::c_void>>,
    len: usize,
    writable: bool,
    /// Held by a creator from `shm_open` until its first write, so peers
    /// never see the zeroed segment.
    pending: Option<Flock<File>>,
}

// SAFETY: the mapping is owned by this handle and only touched through
// `&self`/`&mut self` methods that hold the inter-process flock.
unsafe impl Send for Segment {}

impl Segment {
    fn map(file: File, len: usize, writable: bool) -> std::result::Result<Self, Errno> {
        let map = match NonZeroUsize::new(len) {
            Some(length) => {
                let prot = if writable {
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE
                } else {
                    ProtFlags::PROT_READ
                };
                // SAFETY: `len` never exceeds the object's size, and the
                // mapping is released in `Drop` before `file` is closed.
                Some(unsafe { mman::mmap(None, length, prot, MapFlags::MAP_SHARED, &file, 0)? })
            }
            None => None,
        };

        Ok(Self {
            file,
            map,
            len,
            writable,
            pending: None,
        })
    }

    fn lock(&self) -> Result<Flock<File>> {
        lock_file(&self.file)
    }
}

/// Hold the inter-process lock on `file` until the returned guard drops.
fn lock_file(file: &File) -> Result<Flock<File>> {
    let fd = file
        .try_clone()
        .map_err(|e| AppLockError::Medium(format!("failed to duplicate segment fd: {}", e)))?;
    Flock::lock(fd, FlockArg::LockExclusive)
        .map_err(|(_, errno)| AppLockError::Medium(format!("failed to lock segment: {}", errno)))
}

impl Drop for Segment {
    fn drop(&mut self) {
        if let Some(map) = self.map.take() {
            // SAFETY: `map` came from `mmap` with exactly `len` bytes.
            if let Err(e) = unsafe { mman::munmap(map, self.len) } {
                warn!(error = %e, "failed to unmap lock segment");
            }
        }
    }
}

impl ShmMedium {
    /// `name` must start with `/` and contain no other slash.
    pub fn new(name: String) -> Self {
        Self {
            name,
            segment: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn segment(&self) -> Result<&Segment> {
        self.segment.as_ref().ok_or_else(|| {
            AppLockError::Medium(format!("shared memory '{}' is not attached", self.name))
        })
    }

    fn stat(&self, file: &File) -> Result<Metadata> {
        file.metadata().map_err(|e| {
            AppLockError::Medium(format!("failed to stat shared memory '{}': {}", self.name, e))
        })
    }

    fn unlink(&self) -> Result<()> {
        match mman::shm_unlink(self.name.as_str()) {
            Ok(()) | Err(Errno::ENOENT) => Ok(()),
            Err(e) => Err(AppLockError::Medium(format!(
                "failed to remove shared memory '{}': {}",
                self.name, e
            ))),
        }
    }
}

impl LockMedium for ShmMedium {
    fn kind(&self) -> MediumKind {
        MediumKind::SharedMemory
    }

    fn location(&self) -> String {
        self.name.clone()
    }

    fn create(&mut self) -> Result<()> {
        if self.segment.is_some() {
            return Err(AppLockError::InvalidState(format!(
                "shared memory '{}' is already attached",
                self.name
            )));
        }

        // Readable and writable by everyone (subject to umask): secondaries
        // of other users must be able to raise the request flag.
        let mode = Mode::S_IRUSR
            | Mode::S_IWUSR
            | Mode::S_IRGRP
            | Mode::S_IWGRP
            | Mode::S_IROTH
            | Mode::S_IWOTH;
        let fd = mman::shm_open(
            self.name.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            mode,
        )
        .map_err(|e| {
            if e == Errno::EEXIST {
                AppLockError::AlreadyExists(self.name.clone())
            } else {
                AppLockError::MediumCreate(format!(
                    "failed to create shared memory '{}': {}",
                    self.name, e
                ))
            }
        })?;
        let file = File::from(fd);
        let pending = match lock_file(&file) {
            Ok(guard) => guard,
            Err(e) => {
                let _ = self.unlink();
                return Err(AppLockError::MediumCreate(e.to_string()));
            }
        };

        let created = unistd::ftruncate(&file, SEGMENT_CAPACITY as libc::off_t)
            .and_then(|()| Segment::map(file, SEGMENT_CAPACITY, true));
        match created {
            Ok(mut segment) => {
                segment.pending = Some(pending);
                self.segment = Some(segment);
                Ok(())
            }
            Err(e) => {
                let _ = self.unlink();
                Err(AppLockError::MediumCreate(format!(
                    "failed to size shared memory '{}': {}",
                    self.name, e
                )))
            }
        }
    }

    fn open_existing(&mut self, writable: bool) -> Result<bool> {
        if self.segment.is_some() {
            self.segment = None;
        }

        let flags = if writable {
            OFlag::O_RDWR
        } else {
            OFlag::O_RDONLY
        };
        let fd = match mman::shm_open(self.name.as_str(), flags, Mode::empty()) {
            Ok(fd) => fd,
            Err(Errno::ENOENT) => return Ok(false),
            Err(e) => {
                return Err(AppLockError::Medium(format!(
                    "failed to open shared memory '{}': {}",
                    self.name, e
                )));
            }
        };
        let file = File::from(fd);
        // Wait out a creator that has not written its first record yet.
        let settled = lock_file(&file)?;

        let size = self.stat(&file)?.len();
        let len = usize::try_from(size)
            .unwrap_or(SEGMENT_CAPACITY)
            .min(SEGMENT_CAPACITY);

        let segment = Segment::map(file, len, writable).map_err(|e| {
            AppLockError::Medium(format!(
                "failed to map shared memory '{}': {}",
                self.name, e
            ))
        })?;
        drop(settled);
        self.segment = Some(segment);
        Ok(true)
    }

    fn read(&self) -> Result<Vec<u8>> {
        let segment = self.segment()?;
        let mut bytes = vec![0u8; segment.len];

        let _guard = segment.lock()?;
        if let Some(map) = segment.map {
            // SAFETY: the mapping holds `len` bytes and the flock keeps
            // cooperating writers out for the duration of the copy.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    map.as_ptr() as *const u8,
                    bytes.as_mut_ptr(),
                    segment.len,
                );
            }
        }

        Ok(bytes)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let name = &self.name;
        let segment = self.segment.as_mut().ok_or_else(|| {
            AppLockError::Medium(format!("shared memory '{}' is not attached", name))
        })?;
        if !segment.writable {
            return Err(AppLockError::Medium(format!(
                "shared memory '{}' is attached read-only",
                name
            )));
        }
        let map = match segment.map {
            Some(map) if bytes.len() <= segment.len => map,
            _ => {
                return Err(AppLockError::Medium(format!(
                    "{} bytes do not fit shared memory '{}' ({} bytes)",
                    bytes.len(),
                    name,
                    segment.len
                )));
            }
        };

        let _guard = match segment.pending.take() {
            Some(guard) => guard,
            None => segment.lock()?,
        };
        // SAFETY: `bytes` fits the writable mapping (checked above) and the
        // flock is held for the duration of the copy.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), map.as_ptr() as *mut u8, bytes.len());
        }

        Ok(())
    }

    fn close(&mut self, cleanup: bool) -> Result<()> {
        self.segment = None;
        if cleanup {
            self.unlink()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.segment.is_some()
    }

    fn is_current(&self) -> Result<bool> {
        let Some(segment) = &self.segment else {
            return Ok(false);
        };
        let attached = self.stat(&segment.file)?;
        if attached.nlink() == 0 {
            return Ok(false);
        }

        let fd = match mman::shm_open(self.name.as_str(), OFlag::O_RDONLY, Mode::empty()) {
            Ok(fd) => fd,
            Err(Errno::ENOENT) => return Ok(false),
            Err(e) => {
                return Err(AppLockError::Medium(format!(
                    "failed to open shared memory '{}': {}",
                    self.name, e
                )));
            }
        };
        let named = self.stat(&File::from(fd))?;
        Ok(named.dev() == attached.dev() && named.ino() == attached.ino())
    }
}
