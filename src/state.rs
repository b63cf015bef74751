//! The project state aggregate
//!
//! [`ProjectState`] is the complete savable state of one document: its marks,
//! view transform, display toggles, selection and edit history, plus identity
//! and versioning fields. It is plain owned data; capturing it from a live
//! document always produces independent copies.

use crate::codec::CURRENT_FORMAT_VERSION;
use crate::mark::{Mark, TextMark};
use crate::types::{DisplayToggles, ProjectIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for "no mark selected"
pub const NO_SELECTION: i32 = -1;

/// Default zoom level
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Smallest zoom level a restored document may have
pub const MIN_ZOOM: f64 = 0.05;

/// Largest zoom level a restored document may have
pub const MAX_ZOOM: f64 = 50.0;

/// One saved intermediate mark list in the undo or redo stack
pub type HistoryEntry = Vec<Mark>;

/// Complete savable state of one document
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    /// Marks in z-order
    pub marks: Vec<Mark>,
    /// Text marks kept for older consumers
    pub legacy_text_marks: Vec<TextMark>,
    pub zoom_level: f64,
    pub view_offset_x: i32,
    pub view_offset_y: i32,
    pub grid_visible: bool,
    pub material_boundary_visible: bool,
    pub dot_preview_enabled: bool,
    /// Index into `marks`, or [`NO_SELECTION`]
    pub selected_mark_index: i32,
    pub undo_history: Vec<HistoryEntry>,
    pub redo_history: Vec<HistoryEntry>,
    pub project_name: String,
    pub project_id: String,
    pub project_description: String,
    /// Set when the state is encoded for saving
    pub last_saved: Option<DateTime<Utc>>,
    /// Schema revision that produced (or will produce) this state
    pub format_version: String,
}

impl Default for ProjectState {
    fn default() -> Self {
        let toggles = DisplayToggles::default();
        Self {
            marks: Vec::new(),
            legacy_text_marks: Vec::new(),
            zoom_level: DEFAULT_ZOOM,
            view_offset_x: 0,
            view_offset_y: 0,
            grid_visible: toggles.grid_visible,
            material_boundary_visible: toggles.material_boundary_visible,
            dot_preview_enabled: toggles.dot_preview_enabled,
            selected_mark_index: NO_SELECTION,
            undo_history: Vec::new(),
            redo_history: Vec::new(),
            project_name: String::new(),
            project_id: String::new(),
            project_description: String::new(),
            last_saved: None,
            format_version: CURRENT_FORMAT_VERSION.to_string(),
        }
    }
}

/// Corrections made while normalizing a restored state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corrections {
    /// Stale selection index that was cleared
    pub selection_cleared: Option<i32>,
    /// Zoom level that was replaced, with its replacement
    pub zoom_adjusted: Option<(f64, f64)>,
}

impl Corrections {
    /// Whether anything was changed
    pub fn is_empty(&self) -> bool {
        self.selection_cleared.is_none() && self.zoom_adjusted.is_none()
    }
}

impl ProjectState {
    /// Empty state for a project
    pub fn for_project(identity: &ProjectIdentity) -> Self {
        let mut state = Self::default();
        state.set_identity(identity);
        state
    }

    /// Copy identity fields into the state
    pub fn set_identity(&mut self, identity: &ProjectIdentity) {
        self.project_name = identity.name.clone();
        self.project_id = identity.id.clone();
        self.project_description = identity.description.clone();
    }

    /// Identity stored in the state
    pub fn identity(&self) -> ProjectIdentity {
        ProjectIdentity {
            id: self.project_id.clone(),
            name: self.project_name.clone(),
            description: self.project_description.clone(),
        }
    }

    /// Display toggles as a group
    pub fn toggles(&self) -> DisplayToggles {
        DisplayToggles {
            grid_visible: self.grid_visible,
            material_boundary_visible: self.material_boundary_visible,
            dot_preview_enabled: self.dot_preview_enabled,
        }
    }

    /// Selected mark, if the selection points at one
    pub fn selected_mark(&self) -> Option<&Mark> {
        usize::try_from(self.selected_mark_index)
            .ok()
            .and_then(|index| self.marks.get(index))
    }

    /// Drop history, or keep only the newest `max_entries` per stack (0 = all)
    pub fn trim_history(&mut self, keep: bool, max_entries: usize) {
        if !keep {
            self.undo_history.clear();
            self.redo_history.clear();
            return;
        }
        if max_entries == 0 {
            return;
        }
        for stack in [&mut self.undo_history, &mut self.redo_history] {
            if stack.len() > max_entries {
                let excess = stack.len() - max_entries;
                stack.drain(..excess);
            }
        }
    }

    /// Bring selection and zoom into their valid ranges
    ///
    /// The selection must be [`NO_SELECTION`] or a valid index into `marks`;
    /// anything else is cleared. Zoom must be finite and positive; otherwise it
    /// is reset to [`DEFAULT_ZOOM`], and finite values are clamped to
    /// `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn normalize(&mut self) -> Corrections {
        let mut corrections = Corrections::default();

        let in_range = self.selected_mark_index == NO_SELECTION
            || usize::try_from(self.selected_mark_index)
                .map(|index| index < self.marks.len())
                .unwrap_or(false);
        if !in_range {
            corrections.selection_cleared = Some(self.selected_mark_index);
            self.selected_mark_index = NO_SELECTION;
        }

        let zoom = self.zoom_level;
        let fixed = if !zoom.is_finite() || zoom <= 0.0 {
            DEFAULT_ZOOM
        } else {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        };
        if fixed != zoom {
            corrections.zoom_adjusted = Some((zoom, fixed));
            self.zoom_level = fixed;
        }

        corrections
    }
}
