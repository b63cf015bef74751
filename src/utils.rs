//! Utility functions for marksnap
//!
//! File name sanitization, crash-safe writes, checksums and formatting
//! helpers shared by the store, the catalog and the engine.
//!
//! ## Atomic writes
//!
//! [`atomic_write`] and [`atomic_write_from_reader`] never expose a partially
//! written target. Content goes to a uniquely named temporary file in the
//! target's directory, is flushed and synced, and only then renamed over the
//! target. If anything fails before the rename, the temporary file is removed
//! and the previous target (if any) is untouched.

use crate::error::{Result, SnapshotError};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
///
/// The mapping is deterministic, so the same name always yields the same
/// stem.
///
/// # Example
///
/// ```rust
/// use marksnap::utils::sanitize_file_stem;
///
/// assert_eq!(sanitize_file_stem("My/Proj:1"), "My_Proj_1");
/// assert_eq!(sanitize_file_stem("Bracket-07"), "Bracket-07");
/// ```
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Atomic file write (write to temp file then rename)
///
/// # Errors
///
/// - [`SnapshotError::Io`] if the target has no parent directory, or writing,
///   syncing or renaming fails
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    atomic_write_from_reader(path, &mut io::Cursor::new(content)).map(|_| ())
}

/// Atomic file write whose content is streamed from a reader
///
/// Returns the number of bytes written. A reader error aborts the write and
/// leaves the target as it was.
pub fn atomic_write_from_reader<R: Read + ?Sized>(path: &Path, source: &mut R) -> Result<u64> {
    let dir = parent_dir(path);
    let mut temp = staging_file(dir)?;

    let written = io::copy(source, temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;

    temp.persist(path)?;
    sync_dir(dir);
    Ok(written)
}

/// Atomic write that never replaces an existing file
///
/// Returns `Ok(false)` without touching anything if `path` already exists.
pub fn atomic_create(path: &Path, content: &[u8]) -> Result<bool> {
    let dir = parent_dir(path);
    let mut temp = staging_file(dir)?;

    temp.as_file_mut().write_all(content)?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;

    match temp.persist_noclobber(path) {
        Ok(_) => {
            sync_dir(dir);
            Ok(true)
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn staging_file(dir: &Path) -> Result<tempfile::NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix(".marksnap-")
        .suffix(".partial")
        .tempfile_in(dir)?)
}

/// Best-effort fsync of a directory so a completed rename survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(SnapshotError::ProjectDirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// SHA-256 of the given bytes, hex encoded
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Layout of the timestamp embedded in backup file names
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Timestamp embedded in backup file names, e.g. `20261019T101530.123456Z`
pub fn backup_timestamp(at: DateTime<Utc>) -> String {
    at.format(BACKUP_TIMESTAMP_FORMAT).to_string()
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
