//! Snapshot engine
//!
//! [`SnapshotEngine`] is the entry point hosts use. It ties the accessor,
//! codec, compression adapter, file store, restore pipeline and catalog
//! synchronizer together.
//!
//! ## Save
//!
//! ```text
//! capture -> encode -> maybe compress -> atomic write -> backup -> catalog upsert
//! ```
//!
//! Only capture, encode, compress and the canonical write can fail a save.
//! Backup and catalog problems are recorded as warnings in the
//! [`SaveReport`].
//!
//! ## Load
//!
//! ```text
//! locate -> decompress if needed -> decode -> validate -> apply -> redraw
//! ```
//!
//! See [`crate::restore`] for the stages and the catalog fallback.

use crate::accessor::{Captured, DocumentAccess, StateAccessor};
use crate::catalog::{CatalogClient, CatalogSync};
use crate::codec::{SnapshotCodec, CURRENT_FORMAT_VERSION};
use crate::compression::{
    looks_compressed, CompressionEngine, CompressionStats, CompressionStrategy,
};
use crate::document::SharedDocument;
use crate::error::{Result, SnapshotError};
use crate::restore::{RestoreOutcome, RestorePipeline};
use crate::state::ProjectState;
use crate::store::FileStore;
use crate::types::{
    CatalogReconciliation, ListingSource, PersistenceConfig, ProjectIdentity, ProjectListing,
    SaveReport,
};
use crate::utils;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Main snapshot persistence interface
///
/// Cloning is cheap; clones share the store, compression statistics,
/// accessors and catalog.
///
/// The engine keeps one [`StateAccessor`] per project, keyed by sanitized
/// file stem, so a toggle that cannot be read falls back to that project's
/// own last known value and never to another project's.
///
/// # Examples
///
/// ```rust,no_run
/// use marksnap::{EditorDocument, InMemoryCatalog, ProjectIdentity, SnapshotEngine};
/// use std::sync::Arc;
///
/// # fn main() -> marksnap::Result<()> {
/// let engine = SnapshotEngine::builder()
///     .build("./projects", Arc::new(InMemoryCatalog::new()))?;
///
/// let identity = ProjectIdentity::new("Bracket-07");
/// let doc = EditorDocument::new();
/// let report = engine.save(&identity, &doc)?;
/// println!("saved {:?}", report.path);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SnapshotEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: PersistenceConfig,
    store: FileStore,
    codec: SnapshotCodec,
    compression: Mutex<CompressionEngine>,
    accessors: Mutex<HashMap<String, StateAccessor>>,
    catalog: CatalogSync,
}

impl std::fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .field("catalog", &self.inner.catalog)
            .finish()
    }
}

impl SnapshotEngine {
    /// Create an engine from a configuration
    ///
    /// Nothing is written until the first save.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::InvalidConfiguration`] if the configuration does not
    /// validate.
    pub fn new(config: PersistenceConfig, catalog: Arc<dyn CatalogClient>) -> Result<Self> {
        config.validate()?;
        let store = FileStore::new(&config.project_dir, config.backup_dir());
        let compression = CompressionEngine::new(config.compression.clone());
        info!("Snapshot engine using {:?}", config.project_dir);

        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                codec: SnapshotCodec::new(),
                compression: Mutex::new(compression),
                accessors: Mutex::new(HashMap::new()),
                catalog: CatalogSync::new(catalog),
                config,
            }),
        })
    }

    /// Builder with default settings
    pub fn builder() -> SnapshotEngineBuilder {
        SnapshotEngineBuilder::new()
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.inner.config
    }

    /// File store used for snapshots and backups
    pub fn store(&self) -> &FileStore {
        &self.inner.store
    }

    /// Catalog synchronizer
    pub fn catalog(&self) -> &CatalogSync {
        &self.inner.catalog
    }

    /// Canonical snapshot path for a project name
    pub fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        self.inner.store.path_for(name)
    }

    /// Read every field of a project's document without saving
    pub fn capture<D: DocumentAccess + ?Sized>(&self, name: &str, doc: &D) -> Captured {
        let mut accessors = self.inner.accessors.lock();
        accessors
            .entry(utils::sanitize_file_stem(name))
            .or_default()
            .capture(doc)
    }

    /// Save a document under the identity's name
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::InvalidProjectName`] for an empty name
    /// - [`SnapshotError::Encode`] if the captured state cannot be encoded
    /// - [`SnapshotError::Io`] if the snapshot cannot be written; the
    ///   previous snapshot is left intact
    #[instrument(skip(self, doc), fields(project = %identity.name))]
    pub fn save<D: DocumentAccess + ?Sized>(
        &self,
        identity: &ProjectIdentity,
        doc: &D,
    ) -> Result<SaveReport> {
        let captured = self.capture(&identity.name, doc);
        self.persist(identity, captured)
    }

    /// Save a state that was captured earlier
    #[instrument(skip(self, state), fields(project = %identity.name))]
    pub fn save_state(
        &self,
        identity: &ProjectIdentity,
        state: ProjectState,
    ) -> Result<SaveReport> {
        self.persist(
            identity,
            Captured {
                state,
                field_errors: Vec::new(),
            },
        )
    }

    /// Capture a shared document now and write it on a blocking task
    ///
    /// The document lock is held only while capturing. Encoding, writing,
    /// backup and catalog work run on tokio's blocking pool; dropping the
    /// returned handle does not cancel the write.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Internal`] when called outside a tokio runtime.
    pub fn spawn_save<D>(
        &self,
        identity: ProjectIdentity,
        doc: &SharedDocument<D>,
    ) -> Result<JoinHandle<Result<SaveReport>>>
    where
        D: DocumentAccess,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            SnapshotError::internal(format!("background save needs a tokio runtime: {}", e))
        })?;

        let captured = {
            let guard = doc.lock();
            self.capture(&identity.name, &*guard)
        };
        let engine = self.clone();
        debug!("Queued background save of '{}'", identity.name);
        Ok(handle.spawn_blocking(move || engine.persist(&identity, captured)))
    }

    fn persist(&self, identity: &ProjectIdentity, captured: Captured) -> Result<SaveReport> {
        let start = Instant::now();
        let config = &self.inner.config;
        let degraded_fields = captured.degraded_fields();
        let mut warnings: Vec<String> =
            captured.field_errors.iter().map(|e| e.to_string()).collect();

        let mut state = captured.state;
        state.set_identity(identity);
        state.trim_history(config.persist_history, config.max_history_entries);
        let saved_at = Utc::now();
        state.last_saved = Some(saved_at);
        state.format_version = CURRENT_FORMAT_VERSION.to_string();

        let encoded = self.inner.codec.encode(&state)?;
        let stored = self.inner.compression.lock().maybe_compress(&encoded)?;
        let path = self.inner.store.save(&identity.name, &stored)?;

        let backup_path = if config.backups_enabled {
            match self.inner.store.backup(&identity.name, &stored, saved_at) {
                Ok(backup) => Some(backup),
                Err(e) => {
                    warn!("Backup of '{}' failed: {}", identity.name, e);
                    warnings.push(format!("backup failed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let catalog_synced = match self
            .inner
            .catalog
            .upsert(&identity.id, &identity.name, &identity.description)
        {
            Ok(()) => true,
            Err(e) => {
                warnings.push(format!("catalog not updated: {}", e));
                false
            }
        };

        let report = SaveReport {
            project: identity.clone(),
            path,
            backup_path,
            bytes_written: stored.len() as u64,
            encoded_size: encoded.len() as u64,
            compressed: looks_compressed(&stored),
            checksum: utils::checksum(&stored),
            saved_at,
            degraded_fields,
            catalog_synced,
            warnings,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Saved '{}' ({} marks, {}) in {}ms",
            identity.name,
            state.marks.len(),
            utils::format_bytes(report.bytes_written),
            report.duration_ms
        );
        Ok(report)
    }

    /// Restore a project into a document
    ///
    /// Never panics and never returns a bare error: the outcome says whether
    /// the document was fully restored, whether only catalog metadata is
    /// available, or which stage failed.
    #[instrument(skip(self, doc))]
    pub fn load<D: DocumentAccess + ?Sized>(&self, name: &str, doc: &mut D) -> RestoreOutcome {
        let pipeline = RestorePipeline::new(
            &self.inner.store,
            &self.inner.compression,
            &self.inner.catalog,
        );
        let mut accessors = self.inner.accessors.lock();
        let accessor = accessors
            .entry(utils::sanitize_file_stem(name))
            .or_default();
        pipeline.run(name, accessor, doc)
    }

    /// Restore a project into a shared document, holding its lock throughout
    pub fn load_shared<D: DocumentAccess>(
        &self,
        name: &str,
        doc: &SharedDocument<D>,
    ) -> RestoreOutcome {
        let mut guard = doc.lock();
        self.load(name, &mut *guard)
    }

    /// Project names to offer before a load
    ///
    /// Comes from the catalog when it is available, otherwise from the
    /// snapshot files on disk.
    pub fn list_projects(&self) -> Result<ProjectListing> {
        match self.inner.catalog.list() {
            Ok(names) => Ok(ProjectListing {
                source: ListingSource::Catalog,
                names,
            }),
            Err(e) => {
                debug!("Listing snapshot files instead of catalog: {}", e);
                Ok(ProjectListing {
                    source: ListingSource::SnapshotFiles,
                    names: self.inner.store.list_snapshots()?,
                })
            }
        }
    }

    /// Compare catalog entries with snapshot files
    ///
    /// Catalog names are matched by their sanitized file stem.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::CatalogUnavailable`] if the catalog cannot be listed.
    pub fn reconcile(&self) -> Result<CatalogReconciliation> {
        let names = self.inner.catalog.list()?;
        let snapshots = self.inner.store.list_snapshots()?;

        let on_disk: HashSet<&str> = snapshots.iter().map(String::as_str).collect();
        let catalog_stems: HashSet<String> =
            names.iter().map(|n| utils::sanitize_file_stem(n)).collect();

        let orphaned_entries = names
            .iter()
            .filter(|n| !on_disk.contains(utils::sanitize_file_stem(n).as_str()))
            .cloned()
            .collect();
        let orphaned_snapshots = snapshots
            .iter()
            .filter(|s| !catalog_stems.contains(s.as_str()))
            .cloned()
            .collect();

        let report = CatalogReconciliation {
            orphaned_entries,
            orphaned_snapshots,
        };
        if !report.is_consistent() {
            info!(
                "Catalog and snapshots differ: {} entries without file, {} files without entry",
                report.orphaned_entries.len(),
                report.orphaned_snapshots.len()
            );
        }
        Ok(report)
    }

    /// Backups of a project, oldest first
    pub fn backups(&self, name: &str) -> Result<Vec<PathBuf>> {
        self.inner.store.list_backups(name)
    }

    /// Compression statistics since creation or the last reset
    pub fn compression_stats(&self) -> CompressionStats {
        self.inner.compression.lock().stats().clone()
    }

    pub fn reset_compression_stats(&self) {
        self.inner.compression.lock().reset_stats();
    }
}

/// Builder for [`SnapshotEngine`]
///
/// # Default Values
///
/// - `compression_strategy`: `CompressionStrategy::Fast`
/// - `backups`: enabled, in `backups/`
/// - `persist_history`: true, 50 entries per stack
#[derive(Debug)]
pub struct SnapshotEngineBuilder {
    compression_strategy: CompressionStrategy,
    backups_enabled: bool,
    backup_dir_name: String,
    persist_history: bool,
    max_history_entries: usize,
}

impl Default for SnapshotEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEngineBuilder {
    pub fn new() -> Self {
        let defaults = PersistenceConfig::new(PathBuf::new());
        Self {
            compression_strategy: defaults.compression,
            backups_enabled: defaults.backups_enabled,
            backup_dir_name: defaults.backup_dir_name,
            persist_history: defaults.persist_history,
            max_history_entries: defaults.max_history_entries,
        }
    }

    /// Set compression strategy
    pub fn compression_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.compression_strategy = strategy;
        self
    }

    /// Enable or disable timestamped backups
    pub fn backups(mut self, enabled: bool) -> Self {
        self.backups_enabled = enabled;
        self
    }

    /// Sub-directory of the project directory receiving backups
    pub fn backup_dir_name(mut self, name: impl Into<String>) -> Self {
        self.backup_dir_name = name.into();
        self
    }

    /// Include undo/redo stacks in snapshots
    pub fn persist_history(mut self, persist: bool) -> Self {
        self.persist_history = persist;
        self
    }

    /// Most recent entries kept per history stack (0 = unlimited)
    pub fn max_history_entries(mut self, max: usize) -> Self {
        self.max_history_entries = max;
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// [`SnapshotError::InvalidConfiguration`] for an empty project directory
    /// or a backup directory name that is not a plain name.
    pub fn build(
        self,
        project_dir: impl AsRef<Path>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Result<SnapshotEngine> {
        let config = PersistenceConfig {
            project_dir: project_dir.as_ref().to_path_buf(),
            compression: self.compression_strategy,
            backups_enabled: self.backups_enabled,
            backup_dir_name: self.backup_dir_name,
            persist_history: self.persist_history,
            max_history_entries: self.max_history_entries,
        };
        SnapshotEngine::new(config, catalog)
    }
}
