//! Snapshot file store
//!
//! Maps project names to snapshot files in one directory and keeps
//! timestamped backups next to them.
//!
//! ## Layout
//!
//! ```text
//! project_dir/
//! ├── Bracket-07.mksnap               # canonical snapshot
//! ├── My_Proj_1.mksnap                # "My/Proj:1" after sanitizing
//! └── backups/
//!     ├── Bracket-07_20261019T101530.123456Z.mksnap
//!     └── Bracket-07_20261019T101612.004211Z.mksnap
//! ```
//!
//! ## Crash safety
//!
//! Snapshots are written to a temporary file and renamed into place, so a
//! failed or interrupted save never truncates or deletes the previous
//! snapshot for the same name. Backups use the same write path and are never
//! overwritten; each save that has backups enabled adds a new one. Backups
//! accumulate without pruning.

use crate::error::{Result, SnapshotError};
use crate::types::SNAPSHOT_EXTENSION;
use crate::utils;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Length of `%Y%m%dT%H%M%S%.6fZ` output
const BACKUP_TIMESTAMP_LEN: usize = 23;

/// Directory-backed snapshot storage
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding canonical snapshots
    root: PathBuf,
    /// Directory holding backups
    backup_dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `root` with backups in `backup_dir`
    ///
    /// Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Directory holding canonical snapshots
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding backups
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// File name for a project name (sanitized stem plus extension)
    ///
    /// # Errors
    ///
    /// [`SnapshotError::InvalidProjectName`] for names that are empty or only
    /// whitespace.
    pub fn file_name(name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(SnapshotError::InvalidProjectName(name.to_string()));
        }
        Ok(format!("{}.{}", utils::sanitize_file_stem(name), SNAPSHOT_EXTENSION))
    }

    /// Canonical path for a project name
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(Self::file_name(name)?))
    }

    /// Whether a snapshot exists for the name
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Write a snapshot atomically and return its path
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.save_from_reader(name, &mut io::Cursor::new(bytes))
    }

    /// Write a snapshot whose bytes come from a reader
    ///
    /// If the reader fails part way, the previous snapshot for the name is
    /// left byte-identical and no partial file remains.
    pub fn save_from_reader<R: Read + ?Sized>(
        &self,
        name: &str,
        source: &mut R,
    ) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        utils::ensure_dir(&self.root)?;

        let written = utils::atomic_write_from_reader(&path, source)?;
        debug!(
            "Saved snapshot {:?} ({})",
            path.file_name().unwrap_or_default(),
            utils::format_bytes(written)
        );
        Ok(path)
    }

    /// Read a snapshot
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if no snapshot exists for the name
    /// - [`SnapshotError::Io`] if it exists but cannot be read
    pub fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => {
                trace!("Loaded {} bytes from {:?}", bytes.len(), path);
                Ok(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a backup of a project's snapshot bytes under a timestamped name
    ///
    /// The backup name is `<stem>_<UTC timestamp of saved_at>.<ext>`. If that
    /// name is already taken (two saves within the same microsecond) a
    /// counter is appended, so an existing backup is never replaced. The
    /// bytes are written as given rather than re-read from the canonical
    /// file, so a concurrent save of the same name cannot swap them.
    pub fn backup(&self, name: &str, bytes: &[u8], saved_at: DateTime<Utc>) -> Result<PathBuf> {
        let stem = utils::sanitize_file_stem(name);
        utils::ensure_dir(&self.backup_dir)?;

        let timestamp = utils::backup_timestamp(saved_at);
        let mut counter = 0;
        loop {
            let file_name = if counter == 0 {
                format!("{}_{}.{}", stem, timestamp, SNAPSHOT_EXTENSION)
            } else {
                format!("{}_{}_{}.{}", stem, timestamp, counter, SNAPSHOT_EXTENSION)
            };
            let target = self.backup_dir.join(file_name);
            if utils::atomic_create(&target, bytes)? {
                info!("Backed up '{}' to {:?}", name, target);
                return Ok(target);
            }
            counter += 1;
        }
    }

    /// Sanitized stems of every snapshot in the directory, sorted
    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        let mut stems = Vec::new();
        if !self.root.is_dir() {
            return Ok(stems);
        }
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let is_snapshot = path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION);
            if !path.is_file() || !is_snapshot {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
        stems.sort();
        Ok(stems)
    }

    /// Backups of one project, oldest first
    pub fn list_backups(&self, name: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_", utils::sanitize_file_stem(name));
        let mut backups = Vec::new();
        if !self.backup_dir.is_dir() {
            return Ok(backups);
        }
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(prefix.as_str()))
                .map(is_backup_suffix)
                .unwrap_or(false);
            if matches {
                backups.push(path);
            }
        }
        // Timestamps sort lexically; the counter suffix sorts after its base
        backups.sort();
        Ok(backups)
    }
}

/// `20261019T101530.123456Z[_n].mksnap`
fn is_backup_suffix(rest: &str) -> bool {
    let Some(timestamp) = rest.get(..BACKUP_TIMESTAMP_LEN) else {
        return false;
    };
    if NaiveDateTime::parse_from_str(timestamp, utils::BACKUP_TIMESTAMP_FORMAT).is_err() {
        return false;
    }
    let Some(tail) = rest[BACKUP_TIMESTAMP_LEN..]
        .strip_suffix(SNAPSHOT_EXTENSION)
        .and_then(|t| t.strip_suffix('.'))
    else {
        return false;
    };
    match tail.strip_prefix('_') {
        None => tail.is_empty(),
        Some(counter) => !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit()),
    }
}
