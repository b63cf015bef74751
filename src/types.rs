//! Core data types used throughout the marksnap library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Identity**: [`ProjectIdentity`] - the id/name/description of an open project
//! - **Live state fields**: [`StateField`], [`DisplayToggles`]
//! - **Configuration**: [`PersistenceConfig`]
//! - **Operation results**: [`SaveReport`], [`ProjectListing`], [`CatalogReconciliation`]
//!
//! ## Examples
//!
//! ```rust
//! use marksnap::types::{PersistenceConfig, ProjectIdentity};
//!
//! let identity = ProjectIdentity::new("Bracket-07").with_description("Left bracket");
//! assert_eq!(identity.id.len(), 36);
//!
//! let config = PersistenceConfig::new("/var/lib/marking/projects");
//! assert!(config.backups_enabled);
//! ```

use crate::compression::CompressionStrategy;
use crate::error::{Result, SnapshotError};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension appended to every snapshot file name
pub const SNAPSHOT_EXTENSION: &str = "mksnap";

/// Identity of a project
///
/// The id is generated once, when the project is created, and travels inside
/// every snapshot so it survives save/load cycles. It is never user-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    /// UUID v4 assigned at creation
    pub id: String,
    /// Human-readable project name, also the source of the file name
    pub name: String,
    /// Free-form description shown in the catalog
    pub description: String,
}

impl ProjectIdentity {
    /// Create an identity for a brand new project
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One independently readable field of the live document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// Ordered mark list
    Marks,
    /// Text marks kept for older consumers
    LegacyTextMarks,
    /// Canvas zoom factor
    ZoomLevel,
    /// Horizontal pan offset
    ViewOffsetX,
    /// Vertical pan offset
    ViewOffsetY,
    /// Grid overlay toggle
    GridVisible,
    /// Material boundary toggle
    MaterialBoundaryVisible,
    /// Dot preview toggle
    DotPreviewEnabled,
    /// Index of the selected mark, or -1
    SelectedMarkIndex,
    /// Undo stack of mark-list snapshots
    UndoHistory,
    /// Redo stack of mark-list snapshots
    RedoHistory,
    /// The "clear all" reset step
    Reset,
}

impl StateField {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::Marks => "marks",
            StateField::LegacyTextMarks => "legacy_text_marks",
            StateField::ZoomLevel => "zoom_level",
            StateField::ViewOffsetX => "view_offset_x",
            StateField::ViewOffsetY => "view_offset_y",
            StateField::GridVisible => "grid_visible",
            StateField::MaterialBoundaryVisible => "material_boundary_visible",
            StateField::DotPreviewEnabled => "dot_preview_enabled",
            StateField::SelectedMarkIndex => "selected_mark_index",
            StateField::UndoHistory => "undo_history",
            StateField::RedoHistory => "redo_history",
            StateField::Reset => "reset",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three display toggles of the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayToggles {
    /// Grid overlay shown
    pub grid_visible: bool,
    /// Material boundary outline shown
    pub material_boundary_visible: bool,
    /// Engraving dot preview shown
    pub dot_preview_enabled: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self {
            grid_visible: false,
            material_boundary_visible: true,
            dot_preview_enabled: false,
        }
    }
}

/// Configuration for snapshot persistence
///
/// Can be stored next to the projects as JSON and loaded with
/// [`PersistenceConfig::from_json_file`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding snapshot files
    pub project_dir: PathBuf,
    /// When snapshot payloads are compressed
    #[serde(default)]
    pub compression: CompressionStrategy,
    /// Write a timestamped backup after each successful save
    #[serde(default = "default_true")]
    pub backups_enabled: bool,
    /// Sub-directory of `project_dir` receiving backups
    #[serde(default = "default_backup_dir")]
    pub backup_dir_name: String,
    /// Include undo/redo stacks in snapshots
    #[serde(default = "default_true")]
    pub persist_history: bool,
    /// Most recent entries kept per history stack (0 = unlimited)
    #[serde(default = "default_max_history")]
    pub max_history_entries: usize,
}

fn default_true() -> bool {
    true
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_max_history() -> usize {
    50
}

impl PersistenceConfig {
    /// Default configuration rooted at `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            compression: CompressionStrategy::default(),
            backups_enabled: true,
            backup_dir_name: default_backup_dir(),
            persist_history: true,
            max_history_entries: default_max_history(),
        }
    }

    /// Directory receiving backups
    pub fn backup_dir(&self) -> PathBuf {
        self.project_dir.join(&self.backup_dir_name)
    }

    /// Check the configuration for values the store cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.project_dir.as_os_str().is_empty() {
            return Err(SnapshotError::InvalidConfiguration(
                "project_dir must not be empty".to_string(),
            ));
        }
        let backup = &self.backup_dir_name;
        if backup.is_empty()
            || backup == "."
            || backup == ".."
            || utils::sanitize_file_stem(backup) != *backup
        {
            return Err(SnapshotError::InvalidConfiguration(format!(
                "backup_dir_name {:?} must be a plain directory name",
                backup
            )));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: PersistenceConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn write_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        utils::atomic_write(path, json.as_bytes())
    }
}

/// Result of a successful save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReport {
    /// Identity that was saved
    pub project: ProjectIdentity,
    /// Canonical snapshot path
    pub path: PathBuf,
    /// Backup written after the save, if any
    pub backup_path: Option<PathBuf>,
    /// Bytes written to the canonical file
    pub bytes_written: u64,
    /// Size of the codec output before compression
    pub encoded_size: u64,
    /// Whether the written bytes are an LZ4 frame
    pub compressed: bool,
    /// SHA-256 of the written bytes, hex encoded
    pub checksum: String,
    /// Value stored in the snapshot's `last_saved`
    pub saved_at: DateTime<Utc>,
    /// Fields that fell back to defaults during capture
    pub degraded_fields: Vec<StateField>,
    /// Whether the catalog entry was created or refreshed
    pub catalog_synced: bool,
    /// Non-fatal problems (failed backup, catalog trouble, capture fallbacks)
    pub warnings: Vec<String>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

impl SaveReport {
    /// Whether the save finished without any degradation
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.degraded_fields.is_empty()
    }
}

/// Where a project list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSource {
    /// Names registered in the catalog
    Catalog,
    /// Catalog unavailable; sanitized stems of snapshot files on disk
    SnapshotFiles,
}

/// Human-readable list of projects offered before a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectListing {
    pub source: ListingSource,
    pub names: Vec<String>,
}

/// Divergence between the catalog and the snapshot directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogReconciliation {
    /// Catalog names with no snapshot file
    pub orphaned_entries: Vec<String>,
    /// Snapshot file stems with no catalog entry
    pub orphaned_snapshots: Vec<String>,
}

impl CatalogReconciliation {
    /// Whether catalog and directory agree
    pub fn is_consistent(&self) -> bool {
        self.orphaned_entries.is_empty() && self.orphaned_snapshots.is_empty()
    }
}
