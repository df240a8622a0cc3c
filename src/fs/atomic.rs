//! Atomic file replacement.
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target
//!
//! `rename()` replaces the destination atomically when source and destination
//! share a filesystem, which holds because the temporary file is a sibling of
//! the target. On crash, a temporary file named `.{filename}.{pid}.{n}.tmp` may
//! remain; it is never read as a lock record.

use crate::error::{AppLockError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// Atomically write bytes to a file.
///
/// Writes to a temporary sibling, syncs it, and renames it over `path`, so
/// the target is never observed half-written.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AppLockError::Medium(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;

    write_and_sync(&temp_path, content)?;

    atomic_replace(&temp_path, path)
}

/// Temporary file path used when replacing `target`.
///
/// The PID and sequence number keep two processes, or two threads of one
/// process, from clobbering each other's temporary file.
pub(crate) fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppLockError::Medium(format!("invalid file path '{}'", target.display())))?;

    let sequence = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}.{}.tmp", filename, std::process::id(), sequence);
    Ok(parent.join(temp_name))
}

/// Write content to a file and sync to disk.
///
/// On unix the file is owner-only, since it replaces a private lock file.
fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        AppLockError::Medium(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        AppLockError::Medium(format!("failed to write to temporary file: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        AppLockError::Medium(format!("failed to sync temporary file to disk: {}", e))
    })?;

    Ok(())
}

/// Replace the target file with the source file.
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        AppLockError::Medium(format!(
            "failed to atomically replace '{}': {}",
            target.display(),
            e
        ))
    })?;

    // Persist the directory entry as well.
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".app.lck");

        atomic_write(&file_path, b"record").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"record");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".app.lck");

        fs::write(&file_path, "original content").unwrap();
        atomic_write(&file_path, b"new content").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("dirs").join(".app.lck");

        atomic_write(&file_path, b"nested").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"nested");
    }

    #[test]
    fn test_atomic_write_temp_file_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".app.lck");

        atomic_write(&file_path, b"content").unwrap();

        let temp_path = temp_path_for(&file_path).unwrap();
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_temp_path_is_unique_hidden_sibling_with_pid() {
        let target = Path::new("/some/path/.app.lck");
        let temp = temp_path_for(target).unwrap();

        assert_eq!(temp.parent().unwrap(), Path::new("/some/path"));
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".."));
        assert!(name.contains(&std::process::id().to_string()));
        assert!(name.ends_with(".tmp"));
        assert_ne!(temp, temp_path_for(target).unwrap());
    }

    #[test]
    fn test_leftover_temp_file_does_not_affect_target() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".app.lck");
        fs::write(&file_path, b"old").unwrap();

        // A writer that died between write and rename leaves only the temp file.
        fs::write(temp_path_for(&file_path).unwrap(), b"ne").unwrap();
        assert_eq!(fs::read(&file_path).unwrap(), b"old");

        atomic_write(&file_path, b"new").unwrap();
        assert_eq!(fs::read(&file_path).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".app.lck");

        atomic_write(&file_path, b"private").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_atomic_write_binary_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("binary.bin");

        let binary_content: Vec<u8> = (0..256).map(|i| i as u8).collect();
        atomic_write(&file_path, &binary_content).unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), binary_content);
    }
}
