//! Restore pipeline
//!
//! Loading a project runs through five ordered stages:
//!
//! 1. **Located**: the snapshot file for the name is read
//! 2. **Decoded**: bytes pass the compression adapter and the codec
//! 3. **Validated**: the mark list must be present; selection and zoom are
//!    brought into range
//! 4. **Applied**: the document is cleared and every field written
//! 5. **Signaled**: the document is asked to redraw
//!
//! A failure before **Applied** does not end the load outright. If the
//! catalog knows the project, the outcome is [`RestoreOutcome::MetadataOnly`]:
//! the name and description are available but no document content was
//! restored. That outcome is never reported as a full restore. Failures while
//! applying are reported as [`RestoreOutcome::Failed`] since the document may
//! already be partly rewritten.

use crate::accessor::{DocumentAccess, StateAccessor};
use crate::catalog::{CatalogEntry, CatalogSync};
use crate::codec::SnapshotCodec;
use crate::compression::CompressionEngine;
use crate::error::{Result, SnapshotError};
use crate::state::{Corrections, ProjectState};
use crate::store::FileStore;
use crate::types::ProjectIdentity;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stage of the restore pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStage {
    Located,
    Decoded,
    Validated,
    Applied,
    Signaled,
}

impl RestoreStage {
    /// Whether a failure at this stage may fall back to catalog metadata
    pub fn allows_fallback(&self) -> bool {
        *self < RestoreStage::Applied
    }
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestoreStage::Located => "located",
            RestoreStage::Decoded => "decoded",
            RestoreStage::Validated => "validated",
            RestoreStage::Applied => "applied",
            RestoreStage::Signaled => "signaled",
        };
        f.write_str(name)
    }
}

/// Summary of a complete restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Identity stored in the snapshot
    pub project: ProjectIdentity,
    /// File that was read
    pub path: PathBuf,
    /// Number of marks written into the document
    pub mark_count: usize,
    /// Format version found in the snapshot header
    pub format_version: String,
    /// Whether the file was an LZ4 frame
    pub compressed: bool,
    /// Adjustments made during validation
    pub corrections: Corrections,
    /// Whether a missing catalog entry was created for the project
    pub catalog_registered: bool,
    /// Non-fatal problems
    pub warnings: Vec<String>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Catalog metadata offered when the snapshot itself could not be used
#[derive(Debug)]
pub struct DegradedRestore {
    /// Catalog record for the requested name
    pub entry: CatalogEntry,
    /// Stage that failed
    pub failed_stage: RestoreStage,
    /// Why the snapshot could not be used
    pub error: SnapshotError,
}

/// A load that produced nothing usable
#[derive(Debug)]
pub struct RestoreFailure {
    /// Stage that failed
    pub stage: RestoreStage,
    /// Error raised by that stage
    pub error: SnapshotError,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "restore failed at stage '{}': {}", self.stage, self.error)
    }
}

/// How a load ended
#[derive(Debug)]
pub enum RestoreOutcome {
    /// The document now holds the snapshot's state
    Complete(RestoreReport),
    /// Only catalog metadata is available; the document was not touched
    MetadataOnly(DegradedRestore),
    /// Nothing could be restored
    Failed(RestoreFailure),
}

impl RestoreOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, RestoreOutcome::Complete(_))
    }

    /// Report of a complete restore
    pub fn report(&self) -> Option<&RestoreReport> {
        match self {
            RestoreOutcome::Complete(report) => Some(report),
            _ => None,
        }
    }

    /// Stage that failed, for incomplete outcomes
    pub fn failed_stage(&self) -> Option<RestoreStage> {
        match self {
            RestoreOutcome::Complete(_) => None,
            RestoreOutcome::MetadataOnly(degraded) => Some(degraded.failed_stage),
            RestoreOutcome::Failed(failure) => Some(failure.stage),
        }
    }

    /// Convert into a result; anything short of a complete restore is an error
    pub fn into_result(self) -> Result<RestoreReport> {
        match self {
            RestoreOutcome::Complete(report) => Ok(report),
            RestoreOutcome::MetadataOnly(degraded) => Err(degraded.error),
            RestoreOutcome::Failed(failure) => Err(failure.error),
        }
    }
}

/// Runs the restore stages against one document
pub struct RestorePipeline<'a> {
    store: &'a FileStore,
    compression: &'a Mutex<CompressionEngine>,
    codec: SnapshotCodec,
    catalog: &'a CatalogSync,
}

/// Output of the stages before apply
struct Prepared {
    path: PathBuf,
    state: ProjectState,
    compressed: bool,
    corrections: Corrections,
    warnings: Vec<String>,
}

impl<'a> RestorePipeline<'a> {
    pub fn new(
        store: &'a FileStore,
        compression: &'a Mutex<CompressionEngine>,
        catalog: &'a CatalogSync,
    ) -> Self {
        Self {
            store,
            compression,
            codec: SnapshotCodec::new(),
            catalog,
        }
    }

    /// Restore `name` into `doc`
    pub fn run<D: DocumentAccess + ?Sized>(
        &self,
        name: &str,
        accessor: &mut StateAccessor,
        doc: &mut D,
    ) -> RestoreOutcome {
        let start = Instant::now();

        let Prepared {
            path,
            state,
            compressed,
            corrections,
            mut warnings,
        } = match self.prepare(name) {
            Ok(prepared) => prepared,
            Err((stage, error)) => return self.fall_back(name, stage, error),
        };

        if let Err(error) = accessor.apply(doc, &state) {
            warn!("Applying '{}' failed: {}", name, error);
            return RestoreOutcome::Failed(RestoreFailure {
                stage: RestoreStage::Applied,
                error,
            });
        }
        doc.request_redraw();
        debug!("Restore of '{}' reached stage {}", name, RestoreStage::Signaled);

        let project = state.identity();
        let catalog_registered = match self
            .catalog
            .register_if_missing(&project.id, &project.name, &project.description)
        {
            Ok(added) => added,
            Err(e) => {
                warnings.push(format!("catalog not updated: {}", e));
                false
            }
        };

        let report = RestoreReport {
            project,
            path,
            mark_count: state.marks.len(),
            format_version: state.format_version,
            compressed,
            corrections,
            catalog_registered,
            warnings,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Restored '{}' ({} marks, format {}) in {}ms",
            report.project.name, report.mark_count, report.format_version, report.duration_ms
        );
        RestoreOutcome::Complete(report)
    }

    /// Located, Decoded and Validated
    fn prepare(&self, name: &str) -> std::result::Result<Prepared, (RestoreStage, SnapshotError)> {
        let path = self
            .store
            .path_for(name)
            .map_err(|e| (RestoreStage::Located, e))?;
        let bytes = self
            .store
            .load(name)
            .map_err(|e| (RestoreStage::Located, e))?;

        let raw = self.compression.lock().decompress_if_needed(&bytes);
        let decoded = self
            .codec
            .decode(&raw.bytes)
            .map_err(|e| (RestoreStage::Decoded, e))?;

        if !decoded.marks_present {
            return Err((
                RestoreStage::Validated,
                SnapshotError::InvalidSnapshot("snapshot has no mark list".to_string()),
            ));
        }
        let mut state = decoded.state;
        let mut warnings = Vec::new();
        let corrections = state.normalize();
        if let Some(stale) = corrections.selection_cleared {
            warnings.push(format!("selection {} was out of range and was cleared", stale));
        }
        if let Some((from, to)) = corrections.zoom_adjusted {
            warnings.push(format!("zoom {} replaced by {}", from, to));
        }
        if state.project_name.is_empty() {
            state.project_name = name.to_string();
        }
        if state.project_id.is_empty() {
            state.project_id = Uuid::new_v4().to_string();
            warnings.push("snapshot carried no project id; a new one was assigned".to_string());
        }

        Ok(Prepared {
            path,
            state,
            compressed: raw.was_compressed,
            corrections,
            warnings,
        })
    }

    fn fall_back(&self, name: &str, stage: RestoreStage, error: SnapshotError) -> RestoreOutcome {
        warn!("Restore of '{}' failed at stage {}: {}", name, stage, error);
        match self.catalog.find(name) {
            Ok(Some(entry)) => {
                info!("Offering catalog metadata for '{}'", name);
                RestoreOutcome::MetadataOnly(DegradedRestore {
                    entry,
                    failed_stage: stage,
                    error,
                })
            }
            Ok(None) | Err(_) => RestoreOutcome::Failed(RestoreFailure { stage, error }),
        }
    }
}
