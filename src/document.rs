//! In-memory editor document
//!
//! [`EditorDocument`] is a minimal live document implementing
//! [`DocumentAccess`]. Hosts with their own document model implement the
//! trait directly; this type backs headless tools and tests.
//!
//! Individual fields can be made to fail on read or write, which lets callers
//! exercise degraded capture and failed apply paths.

use crate::accessor::{AccessError, AccessResult, DocumentAccess};
use crate::mark::{Mark, TextMark};
use crate::state::{HistoryEntry, ProjectState, NO_SELECTION};
use crate::types::StateField;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// A document shared between threads
///
/// Capture and apply hold the lock for their whole duration, so no edit can
/// interleave with them.
pub type SharedDocument<D> = Arc<Mutex<D>>;

/// Wrap a document for use from several threads
pub fn share<D>(doc: D) -> SharedDocument<D> {
    Arc::new(Mutex::new(doc))
}

/// Live document held in memory
#[derive(Debug, Clone)]
pub struct EditorDocument {
    state: ProjectState,
    redraw_requests: usize,
    failing_reads: HashSet<StateField>,
    failing_writes: HashSet<StateField>,
}

impl Default for EditorDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorDocument {
    /// Empty document
    pub fn new() -> Self {
        Self {
            state: ProjectState::default(),
            redraw_requests: 0,
            failing_reads: HashSet::new(),
            failing_writes: HashSet::new(),
        }
    }

    /// Place a mark on top of the others and return its index
    pub fn add_mark(&mut self, mark: Mark) -> usize {
        self.state.marks.push(mark);
        self.state.marks.len() - 1
    }

    /// Remove the mark at `index`, keeping the selection on the same mark
    pub fn remove_mark(&mut self, index: usize) -> Option<Mark> {
        if index >= self.state.marks.len() {
            return None;
        }
        let removed = self.state.marks.remove(index);
        let selected = self.state.selected_mark_index;
        if selected >= 0 {
            let selected = selected as usize;
            if selected == index {
                self.state.selected_mark_index = NO_SELECTION;
            } else if selected > index {
                self.state.selected_mark_index -= 1;
            }
        }
        Some(removed)
    }

    /// Marks in z-order
    pub fn mark_list(&self) -> &[Mark] {
        &self.state.marks
    }

    /// Select a mark; an out-of-range index clears the selection
    pub fn select(&mut self, index: usize) {
        self.state.selected_mark_index = if index < self.state.marks.len() {
            index as i32
        } else {
            NO_SELECTION
        };
    }

    /// Record the current marks on the undo stack and drop the redo stack
    pub fn push_undo(&mut self) {
        self.state.undo_history.push(self.state.marks.clone());
        self.state.redo_history.clear();
    }

    /// Step back to the previous mark list; `false` if there is none
    pub fn undo(&mut self) -> bool {
        match self.state.undo_history.pop() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.state.marks, previous);
                self.state.redo_history.push(current);
                self.state.selected_mark_index = NO_SELECTION;
                true
            }
            None => false,
        }
    }

    /// Step forward again after an undo; `false` if there is nothing to redo
    pub fn redo(&mut self) -> bool {
        match self.state.redo_history.pop() {
            Some(next) => {
                let current = std::mem::replace(&mut self.state.marks, next);
                self.state.undo_history.push(current);
                self.state.selected_mark_index = NO_SELECTION;
                true
            }
            None => false,
        }
    }

    /// Number of redraws requested so far
    pub fn redraw_requests(&self) -> usize {
        self.redraw_requests
    }

    /// Make reads of `field` fail
    pub fn fail_read(&mut self, field: StateField) {
        self.failing_reads.insert(field);
    }

    /// Make writes of `field` fail; [`StateField::Reset`] fails `clear_all`
    pub fn fail_write(&mut self, field: StateField) {
        self.failing_writes.insert(field);
    }

    /// Stop injecting failures
    pub fn heal(&mut self) {
        self.failing_reads.clear();
        self.failing_writes.clear();
    }

    fn get<T>(&self, field: StateField, value: impl FnOnce(&ProjectState) -> T) -> AccessResult<T> {
        if self.failing_reads.contains(&field) {
            return Err(AccessError::new(format!("{} is not readable", field)));
        }
        Ok(value(&self.state))
    }

    fn set(
        &mut self,
        field: StateField,
        change: impl FnOnce(&mut ProjectState),
    ) -> AccessResult<()> {
        if self.failing_writes.contains(&field) {
            return Err(AccessError::new(format!("{} is read-only", field)));
        }
        change(&mut self.state);
        Ok(())
    }
}

impl DocumentAccess for EditorDocument {
    fn marks(&self) -> AccessResult<Vec<Mark>> {
        self.get(StateField::Marks, |s| s.marks.clone())
    }

    fn legacy_text_marks(&self) -> AccessResult<Vec<TextMark>> {
        self.get(StateField::LegacyTextMarks, |s| s.legacy_text_marks.clone())
    }

    fn zoom_level(&self) -> AccessResult<f64> {
        self.get(StateField::ZoomLevel, |s| s.zoom_level)
    }

    fn view_offset_x(&self) -> AccessResult<i32> {
        self.get(StateField::ViewOffsetX, |s| s.view_offset_x)
    }

    fn view_offset_y(&self) -> AccessResult<i32> {
        self.get(StateField::ViewOffsetY, |s| s.view_offset_y)
    }

    fn grid_visible(&self) -> AccessResult<bool> {
        self.get(StateField::GridVisible, |s| s.grid_visible)
    }

    fn material_boundary_visible(&self) -> AccessResult<bool> {
        self.get(StateField::MaterialBoundaryVisible, |s| s.material_boundary_visible)
    }

    fn dot_preview_enabled(&self) -> AccessResult<bool> {
        self.get(StateField::DotPreviewEnabled, |s| s.dot_preview_enabled)
    }

    fn selected_mark_index(&self) -> AccessResult<i32> {
        self.get(StateField::SelectedMarkIndex, |s| s.selected_mark_index)
    }

    fn undo_history(&self) -> AccessResult<Vec<HistoryEntry>> {
        self.get(StateField::UndoHistory, |s| s.undo_history.clone())
    }

    fn redo_history(&self) -> AccessResult<Vec<HistoryEntry>> {
        self.get(StateField::RedoHistory, |s| s.redo_history.clone())
    }

    fn set_marks(&mut self, marks: Vec<Mark>) -> AccessResult<()> {
        self.set(StateField::Marks, |s| s.marks = marks)
    }

    fn set_legacy_text_marks(&mut self, marks: Vec<TextMark>) -> AccessResult<()> {
        self.set(StateField::LegacyTextMarks, |s| s.legacy_text_marks = marks)
    }

    fn set_zoom_level(&mut self, zoom: f64) -> AccessResult<()> {
        self.set(StateField::ZoomLevel, |s| s.zoom_level = zoom)
    }

    fn set_view_offset_x(&mut self, x: i32) -> AccessResult<()> {
        self.set(StateField::ViewOffsetX, |s| s.view_offset_x = x)
    }

    fn set_view_offset_y(&mut self, y: i32) -> AccessResult<()> {
        self.set(StateField::ViewOffsetY, |s| s.view_offset_y = y)
    }

    fn set_grid_visible(&mut self, visible: bool) -> AccessResult<()> {
        self.set(StateField::GridVisible, |s| s.grid_visible = visible)
    }

    fn set_material_boundary_visible(&mut self, visible: bool) -> AccessResult<()> {
        self.set(StateField::MaterialBoundaryVisible, |s| s.material_boundary_visible = visible)
    }

    fn set_dot_preview_enabled(&mut self, enabled: bool) -> AccessResult<()> {
        self.set(StateField::DotPreviewEnabled, |s| s.dot_preview_enabled = enabled)
    }

    fn set_selected_mark_index(&mut self, index: i32) -> AccessResult<()> {
        self.set(StateField::SelectedMarkIndex, |s| s.selected_mark_index = index)
    }

    fn set_undo_history(&mut self, history: Vec<HistoryEntry>) -> AccessResult<()> {
        self.set(StateField::UndoHistory, |s| s.undo_history = history)
    }

    fn set_redo_history(&mut self, history: Vec<HistoryEntry>) -> AccessResult<()> {
        self.set(StateField::RedoHistory, |s| s.redo_history = history)
    }

    fn clear_all(&mut self) -> AccessResult<()> {
        self.set(StateField::Reset, |s| *s = ProjectState::default())
    }

    fn request_redraw(&mut self) {
        self.redraw_requests += 1;
    }
}
