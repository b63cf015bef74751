//! # Marksnap - Document snapshots for marking editors
//!
//! Crash-safe, versioned persistence for the live document of a marking or
//! engraving editor: its marks, view transform, display toggles, selection
//! and undo history.
//!
//! ## Overview
//!
//! Marksnap lets a host:
//! - Capture a live document into a self-describing snapshot file
//! - Restore a snapshot into a document, validating it on the way
//! - Keep timestamped backups of every save
//! - Keep an external project catalog in step with the snapshot files
//! - Fall back to catalog metadata when a snapshot is missing or unreadable
//!
//! ## Architecture
//!
//! - **State Accessor**: reads and writes the document through the
//!   [`DocumentAccess`] trait; a failing field is defaulted, never fatal
//! - **Codec**: a `MKSNAP <version>` header followed by a JSON body; the
//!   version is checked before anything else is parsed
//! - **Compression**: optional LZ4 frames; readers detect them without a flag
//! - **File Store**: temp-file-and-rename writes, so a failed save never
//!   damages the previous snapshot
//! - **Restore Pipeline**: located, decoded, validated, applied, signaled
//! - **Catalog Synchronizer**: best-effort; an unavailable catalog never
//!   blocks saving or loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marksnap::mark::{MarkBase, TextMark};
//! use marksnap::{EditorDocument, InMemoryCatalog, ProjectIdentity, SnapshotEngine};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SnapshotEngine::builder()
//!     .build("./projects", Arc::new(InMemoryCatalog::new()))?;
//!
//! let identity = ProjectIdentity::new("Bracket-07");
//! let mut doc = EditorDocument::new();
//! doc.add_mark(TextMark::new(MarkBase::at(10, 20), "A1").into());
//!
//! let report = engine.save(&identity, &doc)?;
//! println!("Saved {} bytes to {:?}", report.bytes_written, report.path);
//!
//! let mut reopened = EditorDocument::new();
//! let restored = engine.load("Bracket-07", &mut reopened).into_result()?;
//! println!("Restored {} marks", restored.mark_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T>`] with [`SnapshotError`]. Loading
//! returns a [`RestoreOutcome`] instead, which distinguishes a full restore,
//! a catalog-only fallback and a failure at a named stage.
//!
//! ## Module Organization
//!
//! - [`mark`], [`state`]: the document model
//! - [`accessor`], [`document`]: reading and writing live documents
//! - [`codec`], [`compression`]: the snapshot byte format
//! - [`store`]: snapshot and backup files
//! - [`restore`]: the load pipeline
//! - [`catalog`]: project catalog clients and synchronization
//! - [`engine`]: the facade tying it together
//! - [`types`], [`error`]: shared types

pub mod accessor;
pub mod catalog;
pub mod codec;
pub mod compression;
pub mod document;
pub mod engine;
pub mod error;
pub mod mark;
pub mod restore;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;

pub use accessor::{AccessError, AccessResult, Captured, DocumentAccess, StateAccessor};
pub use catalog::{CatalogClient, CatalogEntry, CatalogSync, InMemoryCatalog, JsonCatalog};
pub use codec::{DecodedSnapshot, SnapshotCodec, CURRENT_FORMAT_VERSION};
pub use compression::{CompressionEngine, CompressionStats, CompressionStrategy};
pub use document::{share, EditorDocument, SharedDocument};
pub use engine::{SnapshotEngine, SnapshotEngineBuilder};
pub use error::{Result, SnapshotError};
pub use mark::Mark;
pub use restore::{RestoreOutcome, RestoreReport, RestoreStage};
pub use state::ProjectState;
pub use store::FileStore;
pub use types::*;
