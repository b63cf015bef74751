//! State accessor
//!
//! Reads every savable field out of a live document and writes a restored
//! state back into it. The document is reached only through the
//! [`DocumentAccess`] trait; the accessor never inspects document internals.
//!
//! ## Capture
//!
//! Each field is read on its own. A field whose getter fails is replaced by
//! its default and the failure is recorded, so capture always yields a
//! complete [`ProjectState`]:
//!
//! | Field | Fallback |
//! |-------|----------|
//! | marks, legacy text marks, history | empty |
//! | zoom | 1.0 |
//! | view offsets | 0 |
//! | selection | -1 |
//! | display toggles | last value read successfully |
//!
//! ## Apply
//!
//! Apply resets the document with [`DocumentAccess::clear_all`] first, then
//! writes every field. The first failure stops the apply and names the field.

use crate::error::{Result, SnapshotError};
use crate::mark::{Mark, TextMark};
use crate::state::{HistoryEntry, ProjectState};
use crate::types::{DisplayToggles, StateField};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by a live document for one field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AccessError(pub String);

impl AccessError {
    pub fn new(reason: impl Into<String>) -> Self {
        AccessError(reason.into())
    }
}

/// Result of a single document field access
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Field-level access to a live document
///
/// Getters return owned copies. Implementations must not hold references to
/// the returned collections.
pub trait DocumentAccess {
    fn marks(&self) -> AccessResult<Vec<Mark>>;
    fn legacy_text_marks(&self) -> AccessResult<Vec<TextMark>>;
    fn zoom_level(&self) -> AccessResult<f64>;
    fn view_offset_x(&self) -> AccessResult<i32>;
    fn view_offset_y(&self) -> AccessResult<i32>;
    fn grid_visible(&self) -> AccessResult<bool>;
    fn material_boundary_visible(&self) -> AccessResult<bool>;
    fn dot_preview_enabled(&self) -> AccessResult<bool>;
    fn selected_mark_index(&self) -> AccessResult<i32>;
    fn undo_history(&self) -> AccessResult<Vec<HistoryEntry>>;
    fn redo_history(&self) -> AccessResult<Vec<HistoryEntry>>;

    fn set_marks(&mut self, marks: Vec<Mark>) -> AccessResult<()>;
    fn set_legacy_text_marks(&mut self, marks: Vec<TextMark>) -> AccessResult<()>;
    fn set_zoom_level(&mut self, zoom: f64) -> AccessResult<()>;
    fn set_view_offset_x(&mut self, x: i32) -> AccessResult<()>;
    fn set_view_offset_y(&mut self, y: i32) -> AccessResult<()>;
    fn set_grid_visible(&mut self, visible: bool) -> AccessResult<()>;
    fn set_material_boundary_visible(&mut self, visible: bool) -> AccessResult<()>;
    fn set_dot_preview_enabled(&mut self, enabled: bool) -> AccessResult<()>;
    fn set_selected_mark_index(&mut self, index: i32) -> AccessResult<()>;
    fn set_undo_history(&mut self, history: Vec<HistoryEntry>) -> AccessResult<()>;
    fn set_redo_history(&mut self, history: Vec<HistoryEntry>) -> AccessResult<()>;

    /// Reset the document to an empty state before a restore
    fn clear_all(&mut self) -> AccessResult<()>;

    /// Ask the host to redraw after a restore
    fn request_redraw(&mut self);
}

/// State read from a document, with the fields that fell back to defaults
#[derive(Debug)]
pub struct Captured {
    pub state: ProjectState,
    /// One [`SnapshotError::FieldCapture`] per failed getter
    pub field_errors: Vec<SnapshotError>,
}

impl Captured {
    /// Fields that were replaced by defaults
    pub fn degraded_fields(&self) -> Vec<StateField> {
        self.field_errors
            .iter()
            .filter_map(|e| match e {
                SnapshotError::FieldCapture { field, .. } => Some(*field),
                _ => None,
            })
            .collect()
    }
}

/// Captures and applies [`ProjectState`] through [`DocumentAccess`]
#[derive(Debug, Clone, Default)]
pub struct StateAccessor {
    last_known: DisplayToggles,
}

impl StateAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle values used when a toggle getter fails
    pub fn last_known_toggles(&self) -> DisplayToggles {
        self.last_known
    }

    /// Read every field of the document
    ///
    /// Never fails. Getters that fail are replaced by defaults and listed in
    /// [`Captured::field_errors`].
    pub fn capture<D: DocumentAccess + ?Sized>(&mut self, doc: &D) -> Captured {
        let mut errors = Vec::new();
        let defaults = ProjectState::default();
        let toggles = self.last_known;

        let state = ProjectState {
            marks: read(&mut errors, StateField::Marks, doc.marks(), Vec::new()),
            legacy_text_marks: read(
                &mut errors,
                StateField::LegacyTextMarks,
                doc.legacy_text_marks(),
                Vec::new(),
            ),
            zoom_level: read(
                &mut errors,
                StateField::ZoomLevel,
                doc.zoom_level(),
                defaults.zoom_level,
            ),
            view_offset_x: read(&mut errors, StateField::ViewOffsetX, doc.view_offset_x(), 0),
            view_offset_y: read(&mut errors, StateField::ViewOffsetY, doc.view_offset_y(), 0),
            grid_visible: read(
                &mut errors,
                StateField::GridVisible,
                doc.grid_visible(),
                toggles.grid_visible,
            ),
            material_boundary_visible: read(
                &mut errors,
                StateField::MaterialBoundaryVisible,
                doc.material_boundary_visible(),
                toggles.material_boundary_visible,
            ),
            dot_preview_enabled: read(
                &mut errors,
                StateField::DotPreviewEnabled,
                doc.dot_preview_enabled(),
                toggles.dot_preview_enabled,
            ),
            selected_mark_index: read(
                &mut errors,
                StateField::SelectedMarkIndex,
                doc.selected_mark_index(),
                defaults.selected_mark_index,
            ),
            undo_history: read(
                &mut errors,
                StateField::UndoHistory,
                doc.undo_history(),
                Vec::new(),
            ),
            redo_history: read(
                &mut errors,
                StateField::RedoHistory,
                doc.redo_history(),
                Vec::new(),
            ),
            ..defaults
        };

        // Only toggles read from the document become the new safe values
        let failed = |field: StateField| {
            errors
                .iter()
                .any(|e| matches!(e, SnapshotError::FieldCapture { field: f, .. } if *f == field))
        };
        if !failed(StateField::GridVisible) {
            self.last_known.grid_visible = state.grid_visible;
        }
        if !failed(StateField::MaterialBoundaryVisible) {
            self.last_known.material_boundary_visible = state.material_boundary_visible;
        }
        if !failed(StateField::DotPreviewEnabled) {
            self.last_known.dot_preview_enabled = state.dot_preview_enabled;
        }

        if errors.is_empty() {
            debug!("Captured {} marks", state.marks.len());
        } else {
            warn!(
                "Captured {} marks with {} field(s) defaulted",
                state.marks.len(),
                errors.len()
            );
        }
        Captured {
            state,
            field_errors: errors,
        }
    }

    /// Reset the document and write every field of `state` into it
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Apply`] naming the first field the document refused.
    /// The document may be partially written at that point.
    pub fn apply<D: DocumentAccess + ?Sized>(
        &mut self,
        doc: &mut D,
        state: &ProjectState,
    ) -> Result<()> {
        write(StateField::Reset, doc.clear_all())?;
        write(StateField::Marks, doc.set_marks(state.marks.clone()))?;
        write(
            StateField::LegacyTextMarks,
            doc.set_legacy_text_marks(state.legacy_text_marks.clone()),
        )?;
        write(StateField::ZoomLevel, doc.set_zoom_level(state.zoom_level))?;
        write(StateField::ViewOffsetX, doc.set_view_offset_x(state.view_offset_x))?;
        write(StateField::ViewOffsetY, doc.set_view_offset_y(state.view_offset_y))?;
        write(StateField::GridVisible, doc.set_grid_visible(state.grid_visible))?;
        write(
            StateField::MaterialBoundaryVisible,
            doc.set_material_boundary_visible(state.material_boundary_visible),
        )?;
        write(
            StateField::DotPreviewEnabled,
            doc.set_dot_preview_enabled(state.dot_preview_enabled),
        )?;
        write(
            StateField::SelectedMarkIndex,
            doc.set_selected_mark_index(state.selected_mark_index),
        )?;
        write(
            StateField::UndoHistory,
            doc.set_undo_history(state.undo_history.clone()),
        )?;
        write(
            StateField::RedoHistory,
            doc.set_redo_history(state.redo_history.clone()),
        )?;

        self.last_known = state.toggles();
        debug!("Applied {} marks", state.marks.len());
        Ok(())
    }
}

fn read<T>(
    errors: &mut Vec<SnapshotError>,
    field: StateField,
    value: AccessResult<T>,
    fallback: T,
) -> T {
    match value {
        Ok(value) => value,
        Err(e) => {
            warn!("Reading {} failed, using default: {}", field, e);
            errors.push(SnapshotError::FieldCapture {
                field,
                reason: e.0,
            });
            fallback
        }
    }
}

fn write(field: StateField, result: AccessResult<()>) -> Result<()> {
    result.map_err(|e| SnapshotError::Apply { field, reason: e.0 })
}
