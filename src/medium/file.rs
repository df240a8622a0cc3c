//! Lock file medium.

use super::LockMedium;
use crate::config::MediumKind;
use crate::error::{AppLockError, Result};
use crate::fs::atomic_write;
use filetime::FileTime;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Lock record stored in a file.
///
/// No file descriptor is kept between operations: every write replaces the
/// file with a new inode, so each read goes back to the path.
#[derive(Debug)]
pub struct FileMedium {
    path: PathBuf,
    access: Option<Access>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadOnly,
    ReadWrite,
}

impl FileMedium {
    pub fn new(path: PathBuf) -> Self {
        Self { path, access: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn require_open(&self) -> Result<Access> {
        self.access.ok_or_else(|| {
            AppLockError::Medium(format!("lock file '{}' is not open", self.path.display()))
        })
    }
}

impl LockMedium for FileMedium {
    fn kind(&self) -> MediumKind {
        MediumKind::File
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn create(&mut self) -> Result<()> {
        if self.access.is_some() {
            return Err(AppLockError::InvalidState(format!(
                "lock file '{}' is already open",
                self.path.display()
            )));
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AppLockError::MediumCreate(format!(
                    "failed to create lock directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options.open(&self.path).map_err(|e| {
            AppLockError::MediumCreate(format!(
                "failed to create lock file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        self.access = Some(Access::ReadWrite);
        Ok(())
    }

    fn open_existing(&mut self, writable: bool) -> Result<bool> {
        match OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&self.path)
        {
            Ok(_) => {
                self.access = Some(if writable {
                    Access::ReadWrite
                } else {
                    Access::ReadOnly
                });
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppLockError::Medium(format!(
                "failed to open lock file '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn read(&self) -> Result<Vec<u8>> {
        self.require_open()?;

        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppLockError::Medium(format!(
                "failed to read lock file '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.require_open()? != Access::ReadWrite {
            return Err(AppLockError::Medium(format!(
                "lock file '{}' is open read-only",
                self.path.display()
            )));
        }

        atomic_write(&self.path, bytes)
    }

    fn close(&mut self, cleanup: bool) -> Result<()> {
        self.access = None;

        if cleanup {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppLockError::Medium(format!(
                        "failed to remove lock file '{}': {}",
                        self.path.display(),
                        e
                    )));
                }
            }
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.access.is_some()
    }

    fn tracks_modification_time(&self) -> bool {
        true
    }

    fn modified_ms(&self) -> Option<i64> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        i64::try_from(since_epoch.as_millis()).ok()
    }

    fn touch(&mut self, now_ms: i64) -> Result<()> {
        self.require_open()?;

        let mtime = FileTime::from_unix_time(
            now_ms.div_euclid(1000),
            (now_ms.rem_euclid(1000) * 1_000_000) as u32,
        );
        filetime::set_file_mtime(&self.path, mtime).map_err(|e| {
            AppLockError::Medium(format!(
                "failed to touch lock file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}
