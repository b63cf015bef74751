//! Snapshot codec
//!
//! Converts a [`ProjectState`] to and from bytes. The codec knows nothing about
//! compression; it always works on the raw form.
//!
//! ## Format
//!
//! ```text
//! MKSNAP 2.0\n
//! { ...JSON body... }
//! ```
//!
//! The header line carries the format version and is the first thing the
//! decoder reads. A snapshot whose version this build cannot understand is
//! rejected before the body is parsed.
//!
//! | Version | Body |
//! |---------|------|
//! | 1.x     | marks, view, toggles, selection, identity |
//! | 2.x     | 1.x plus legacy text marks and undo/redo history |
//!
//! Older snapshots decode with defaults for the fields they lack.
//!
//! Decoding is structural only. A negative zoom, a stale selection index or
//! an absent mark list all decode successfully and are left to the restore
//! pipeline's validation stage.

use crate::error::{Result, SnapshotError};
use crate::mark::{Mark, TextMark};
use crate::state::{HistoryEntry, ProjectState, DEFAULT_ZOOM, NO_SELECTION};
use crate::types::DisplayToggles;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Format version written by this build
pub const CURRENT_FORMAT_VERSION: &str = "2.0";

/// Highest major version this build can read
const MAX_SUPPORTED_MAJOR: u32 = 2;

/// Leading bytes of every encoded snapshot
const HEADER_MAGIC: &[u8] = b"MKSNAP ";

/// The header line is never longer than this
const MAX_HEADER_LEN: usize = 64;

/// Result of decoding snapshot bytes
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSnapshot {
    /// Decoded state; absent collections are empty
    pub state: ProjectState,
    /// Whether the body actually contained a mark list
    pub marks_present: bool,
}

/// Body written by this build. Borrows the state to avoid copying marks.
#[derive(Serialize)]
struct SnapshotBody<'a> {
    project_id: &'a str,
    project_name: &'a str,
    project_description: &'a str,
    last_saved: Option<DateTime<Utc>>,
    marks: &'a [Mark],
    legacy_text_marks: &'a [TextMark],
    zoom_level: f64,
    view_offset_x: i32,
    view_offset_y: i32,
    grid_visible: bool,
    material_boundary_visible: bool,
    dot_preview_enabled: bool,
    selected_mark_index: i32,
    undo_history: &'a [HistoryEntry],
    redo_history: &'a [HistoryEntry],
}

/// Body as read from any supported version. Every field is optional.
#[derive(Deserialize, Default)]
#[serde(default)]
struct WireBody {
    project_id: Option<String>,
    project_name: Option<String>,
    project_description: Option<String>,
    last_saved: Option<DateTime<Utc>>,
    marks: Option<Vec<Mark>>,
    legacy_text_marks: Option<Vec<TextMark>>,
    zoom_level: Option<f64>,
    view_offset_x: Option<i32>,
    view_offset_y: Option<i32>,
    grid_visible: Option<bool>,
    material_boundary_visible: Option<bool>,
    dot_preview_enabled: Option<bool>,
    /// Wider than the state's index so out-of-range values reach `normalize`
    selected_mark_index: Option<i64>,
    undo_history: Option<Vec<HistoryEntry>>,
    redo_history: Option<Vec<HistoryEntry>>,
}

/// Encodes and decodes project states
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotCodec;

impl SnapshotCodec {
    /// Create a codec
    pub fn new() -> Self {
        Self
    }

    /// Encode a state with the current format version
    ///
    /// The state's own `format_version` is ignored: bytes produced here are
    /// always in the current format.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Encode`] if a floating point value is not finite
    /// (JSON has no representation for it) or serialization fails.
    pub fn encode(&self, state: &ProjectState) -> Result<Vec<u8>> {
        if let Some(field) = non_finite_field(state) {
            return Err(SnapshotError::encode(format!(
                "{} is not a finite number",
                field
            )));
        }

        let body = SnapshotBody {
            project_id: &state.project_id,
            project_name: &state.project_name,
            project_description: &state.project_description,
            last_saved: state.last_saved,
            marks: &state.marks,
            legacy_text_marks: &state.legacy_text_marks,
            zoom_level: state.zoom_level,
            view_offset_x: state.view_offset_x,
            view_offset_y: state.view_offset_y,
            grid_visible: state.grid_visible,
            material_boundary_visible: state.material_boundary_visible,
            dot_preview_enabled: state.dot_preview_enabled,
            selected_mark_index: state.selected_mark_index,
            undo_history: &state.undo_history,
            redo_history: &state.redo_history,
        };

        let mut out = Vec::with_capacity(4096);
        out.extend_from_slice(HEADER_MAGIC);
        out.extend_from_slice(CURRENT_FORMAT_VERSION.as_bytes());
        out.push(b'\n');
        serde_json::to_writer(&mut out, &body)
            .map_err(|e| SnapshotError::encode(e.to_string()))?;

        trace!(
            "Encoded {} marks into {} bytes",
            state.marks.len(),
            out.len()
        );
        Ok(out)
    }

    /// Decode snapshot bytes
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::Decode`] for a missing/malformed header or a body
    ///   that is not valid JSON of the expected shape
    /// - [`SnapshotError::UnsupportedVersion`] for a version from a newer schema
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedSnapshot> {
        let (version, body) = Self::split_header(bytes)?;
        check_version(&version)?;

        let wire: WireBody = serde_json::from_slice(body)
            .map_err(|e| SnapshotError::decode(format!("body of version {}: {}", version, e)))?;

        let toggles = DisplayToggles::default();
        let marks_present = wire.marks.is_some();
        let state = ProjectState {
            marks: wire.marks.unwrap_or_default(),
            legacy_text_marks: wire.legacy_text_marks.unwrap_or_default(),
            zoom_level: wire.zoom_level.unwrap_or(DEFAULT_ZOOM),
            view_offset_x: wire.view_offset_x.unwrap_or(0),
            view_offset_y: wire.view_offset_y.unwrap_or(0),
            grid_visible: wire.grid_visible.unwrap_or(toggles.grid_visible),
            material_boundary_visible: wire
                .material_boundary_visible
                .unwrap_or(toggles.material_boundary_visible),
            dot_preview_enabled: wire.dot_preview_enabled.unwrap_or(toggles.dot_preview_enabled),
            selected_mark_index: wire
                .selected_mark_index
                .map_or(NO_SELECTION, saturate_index),
            undo_history: wire.undo_history.unwrap_or_default(),
            redo_history: wire.redo_history.unwrap_or_default(),
            project_name: wire.project_name.unwrap_or_default(),
            project_id: wire.project_id.unwrap_or_default(),
            project_description: wire.project_description.unwrap_or_default(),
            last_saved: wire.last_saved,
            format_version: version,
        };

        debug!(
            "Decoded snapshot '{}' (format {}, {} marks)",
            state.project_name,
            state.format_version,
            state.marks.len()
        );
        Ok(DecodedSnapshot { state, marks_present })
    }

    /// Read only the format version of encoded bytes
    pub fn peek_version(&self, bytes: &[u8]) -> Result<String> {
        Self::split_header(bytes).map(|(version, _)| version)
    }

    fn split_header(bytes: &[u8]) -> Result<(String, &[u8])> {
        if !bytes.starts_with(HEADER_MAGIC) {
            return Err(SnapshotError::decode("missing snapshot header"));
        }
        let window = &bytes[..bytes.len().min(MAX_HEADER_LEN)];
        let newline = window
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| SnapshotError::decode("unterminated snapshot header"))?;
        let version = std::str::from_utf8(&bytes[HEADER_MAGIC.len()..newline])
            .map_err(|_| SnapshotError::decode("snapshot header is not UTF-8"))?
            .trim();
        if version.is_empty() {
            return Err(SnapshotError::decode("snapshot header has no format version"));
        }
        Ok((version.to_string(), &bytes[newline + 1..]))
    }
}

/// First floating point attribute JSON cannot represent, if any
fn non_finite_field(state: &ProjectState) -> Option<&'static str> {
    if !state.zoom_level.is_finite() {
        return Some("zoom_level");
    }
    let all_marks = state
        .marks
        .iter()
        .chain(state.undo_history.iter().flatten())
        .chain(state.redo_history.iter().flatten());
    for mark in all_marks {
        match mark {
            Mark::BowText(m) if !m.start_angle.is_finite() => return Some("start_angle"),
            Mark::Ruler(m) if !m.scale_value.is_finite() => return Some("scale_value"),
            Mark::Ruler(m) if !m.start_value.is_finite() => return Some("start_value"),
            _ => {}
        }
    }
    None
}

/// Pin an index outside `i32` to the nearest bound; neither bound is a
/// valid selection, so validation clears it
fn saturate_index(index: i64) -> i32 {
    index.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Accept `major.minor` versions whose major this build understands
fn check_version(version: &str) -> Result<()> {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|m| m.parse::<u32>().ok());
    let minor_ok = parts.next().map_or(true, |m| m.parse::<u32>().is_ok());
    match major {
        Some(major)
            if (1..=MAX_SUPPORTED_MAJOR).contains(&major)
                && minor_ok
                && parts.next().is_none() =>
        {
            Ok(())
        }
        _ => Err(SnapshotError::UnsupportedVersion(version.to_string())),
    }
}
