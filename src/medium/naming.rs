//! Deterministic names for lock media.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::path::{Path, PathBuf};

/// Encode the application name and its scope qualifiers into a key that is
/// safe to use in file and shared-memory object names.
pub fn lock_key(name: &str, qualifiers: &[String]) -> String {
    let mut raw = name.to_string();
    for qualifier in qualifiers {
        raw.push('|');
        raw.push_str(qualifier);
    }
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Lock file for `key` inside `dir`: `<dir>/.<key>.lck`.
pub fn lock_file_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!(".{}.lck", key))
}

/// POSIX shared-memory object name for `key`.
pub fn shm_object_name(key: &str) -> String {
    format!("/applock.{}", key)
}
