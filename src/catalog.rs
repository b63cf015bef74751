//! Project catalog synchronization
//!
//! The catalog is an external, lightweight registry of project names and
//! descriptions. Its lifecycle is independent of snapshot files: an entry may
//! exist without a snapshot and a snapshot may exist without an entry. Both
//! are tolerated.
//!
//! [`CatalogClient`] is the contract the engine consumes. Two clients are
//! provided: [`InMemoryCatalog`] and the file-backed [`JsonCatalog`].
//! [`CatalogSync`] wraps any client so that an unavailable catalog never
//! disturbs snapshot saving or loading: every call reports failure to the
//! caller instead.

use crate::error::{Result, SnapshotError};
use crate::utils;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A registered project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Access to an external project catalog
///
/// Every method may fail with [`SnapshotError::CatalogUnavailable`] when the
/// catalog is not ready.
pub trait CatalogClient: Send + Sync {
    /// Whether the catalog can currently be used
    fn is_ready(&self) -> bool;

    /// Register a project; `false` if the name is already taken
    fn add_project(&self, id: &str, name: &str, description: &str) -> Result<bool>;

    /// Names of all registered projects, in registration order
    fn list_projects(&self) -> Result<Vec<String>>;

    /// Number of registered projects
    fn project_count(&self) -> Result<usize>;

    /// Entry registered under `name`
    fn find_project(&self, name: &str) -> Result<Option<CatalogEntry>>;

    /// Set the modified timestamp (and optionally the description);
    /// `false` if no entry has that name
    fn touch_project(
        &self,
        name: &str,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Catalog held in memory
///
/// Useful for hosts without a persistent catalog and for tests. An
/// unavailable instance simulates a catalog that has not been initialized.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
    unavailable: bool,
}

impl InMemoryCatalog {
    /// Empty, ready catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog that rejects every call
    pub fn unavailable() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(SnapshotError::catalog_unavailable("in-memory catalog disabled"));
        }
        Ok(())
    }
}

impl CatalogClient for InMemoryCatalog {
    fn is_ready(&self) -> bool {
        !self.unavailable
    }

    fn add_project(&self, id: &str, name: &str, description: &str) -> Result<bool> {
        self.check()?;
        let mut entries = self.entries.write();
        Ok(insert_entry(&mut entries, id, name, description))
    }

    fn list_projects(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.entries.read().iter().map(|e| e.name.clone()).collect())
    }

    fn project_count(&self) -> Result<usize> {
        self.check()?;
        Ok(self.entries.read().len())
    }

    fn find_project(&self, name: &str) -> Result<Option<CatalogEntry>> {
        self.check()?;
        Ok(self.entries.read().iter().find(|e| e.name == name).cloned())
    }

    fn touch_project(
        &self,
        name: &str,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check()?;
        let mut entries = self.entries.write();
        Ok(touch_entry(&mut entries, name, description, at))
    }
}

fn insert_entry(entries: &mut Vec<CatalogEntry>, id: &str, name: &str, description: &str) -> bool {
    if entries.iter().any(|e| e.name == name) {
        return false;
    }
    let now = Utc::now();
    entries.push(CatalogEntry {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        created: now,
        modified: now,
    });
    true
}

fn touch_entry(
    entries: &mut [CatalogEntry],
    name: &str,
    description: Option<&str>,
    at: DateTime<Utc>,
) -> bool {
    match entries.iter_mut().find(|e| e.name == name) {
        Some(entry) => {
            entry.modified = at;
            if let Some(description) = description {
                entry.description = description.to_string();
            }
            true
        }
        None => false,
    }
}

/// On-disk catalog document
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    entries: Vec<CatalogEntry>,
}

/// Catalog stored as `catalog.json` in a directory
///
/// The catalog is not ready until [`JsonCatalog::initialize`] has created
/// the file. Every mutation rewrites the file atomically.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonCatalog {
    /// File name inside the catalog directory
    pub const FILE_NAME: &'static str = "catalog.json";

    /// Catalog in `dir` (not created yet)
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(Self::FILE_NAME),
            lock: RwLock::new(()),
        }
    }

    /// Create the catalog file if it does not exist
    pub fn initialize(&self) -> Result<()> {
        let _guard = self.lock.write();
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            utils::ensure_dir(parent)?;
        }
        write_catalog(&self.path, &CatalogFile { version: 1, entries: Vec::new() })
    }

    /// Path of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CatalogFile> {
        if !self.path.is_file() {
            return Err(SnapshotError::catalog_unavailable(format!(
                "catalog {:?} not initialized",
                self.path
            )));
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| SnapshotError::catalog_unavailable(format!("{:?}: {}", self.path, e)))?;
        serde_json::from_str(&json).map_err(|e| {
            SnapshotError::catalog_unavailable(format!("{:?} is corrupt: {}", self.path, e))
        })
    }

    fn modify<T>(&self, change: impl FnOnce(&mut Vec<CatalogEntry>) -> T) -> Result<T> {
        let _guard = self.lock.write();
        let mut file = self.read()?;
        let result = change(&mut file.entries);
        write_catalog(&self.path, &file)?;
        Ok(result)
    }
}

fn write_catalog(path: &Path, file: &CatalogFile) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    utils::atomic_write(path, json.as_bytes())
}

impl CatalogClient for JsonCatalog {
    fn is_ready(&self) -> bool {
        self.path.is_file()
    }

    fn add_project(&self, id: &str, name: &str, description: &str) -> Result<bool> {
        self.modify(|entries| insert_entry(entries, id, name, description))
    }

    fn list_projects(&self) -> Result<Vec<String>> {
        let _guard = self.lock.read();
        Ok(self.read()?.entries.into_iter().map(|e| e.name).collect())
    }

    fn project_count(&self) -> Result<usize> {
        let _guard = self.lock.read();
        Ok(self.read()?.entries.len())
    }

    fn find_project(&self, name: &str) -> Result<Option<CatalogEntry>> {
        let _guard = self.lock.read();
        Ok(self.read()?.entries.into_iter().find(|e| e.name == name))
    }

    fn touch_project(
        &self,
        name: &str,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.modify(|entries| touch_entry(entries, name, description, at))
    }
}

/// Best-effort bridge between the engine and a catalog client
///
/// Failures are logged and returned, never escalated; callers decide whether
/// to record them.
#[derive(Clone)]
pub struct CatalogSync {
    client: Arc<dyn CatalogClient>,
}

impl std::fmt::Debug for CatalogSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSync")
            .field("ready", &self.client.is_ready())
            .finish()
    }
}

impl CatalogSync {
    /// Wrap a client
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &Arc<dyn CatalogClient> {
        &self.client
    }

    fn ready(&self) -> Result<()> {
        if self.client.is_ready() {
            Ok(())
        } else {
            Err(SnapshotError::catalog_unavailable("catalog not ready"))
        }
    }

    /// Register the project, or refresh its modified time and description
    pub fn upsert(&self, id: &str, name: &str, description: &str) -> Result<()> {
        let result = self.ready().and_then(|_| {
            if self.client.touch_project(name, Some(description), Utc::now())? {
                debug!("Refreshed catalog entry '{}'", name);
                return Ok(());
            }
            if !self.client.add_project(id, name, description)? {
                // Registered concurrently between the two calls
                self.client.touch_project(name, Some(description), Utc::now())?;
            }
            debug!("Registered '{}' in catalog", name);
            Ok(())
        });
        log_failure("upsert", name, result)
    }

    /// Registered project names
    pub fn list(&self) -> Result<Vec<String>> {
        let result = self.ready().and_then(|_| self.client.list_projects());
        log_failure("list", "*", result)
    }

    /// Update the modified timestamp; `false` if the name is not registered
    pub fn touch(&self, name: &str) -> Result<bool> {
        let result = self
            .ready()
            .and_then(|_| self.client.touch_project(name, None, Utc::now()));
        log_failure("touch", name, result)
    }

    /// Entry registered under `name`
    pub fn find(&self, name: &str) -> Result<Option<CatalogEntry>> {
        let result = self.ready().and_then(|_| self.client.find_project(name));
        log_failure("find", name, result)
    }

    /// Register the project only if the name is unknown; `true` if added
    pub fn register_if_missing(&self, id: &str, name: &str, description: &str) -> Result<bool> {
        let result = self.ready().and_then(|_| self.client.add_project(id, name, description));
        log_failure("register", name, result)
    }
}

fn log_failure<T>(operation: &str, name: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!("Catalog {} for '{}' failed: {}", operation, name, e);
    }
    result
}
