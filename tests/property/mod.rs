//! Property-based testing for marksnap
//!
//! Uses proptest to verify invariants across randomly generated documents
//! and project names.

use ::marksnap::mark::{
    AvoidPointMark, GraphMark, GraphShape, LineMark, LineStyle, MarkBase, Orientation, RulerMark,
    TextMark,
};
use ::marksnap::state::{MAX_ZOOM, MIN_ZOOM, NO_SELECTION};
use ::marksnap::utils::sanitize_file_stem;
use ::marksnap::*;
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn base_strategy() -> impl Strategy<Value = MarkBase> {
    (-5_000i32..5_000, -5_000i32..5_000, any::<bool>(), any::<bool>()).prop_map(
        |(x, y, drag_enabled, resize_enabled)| MarkBase {
            x,
            y,
            drag_enabled,
            resize_enabled,
        },
    )
}

/// Generate one mark of a random kind
fn mark_strategy() -> impl Strategy<Value = Mark> {
    prop_oneof![
        (base_strategy(), "[ -~]{0,24}", any::<bool>()).prop_map(|(base, text, bold)| {
            let mut mark = TextMark::new(base, text);
            mark.bold = bold;
            Mark::Text(mark)
        }),
        (base_strategy(), 1u32..2_000, -1_000.0f64..1_000.0, any::<bool>()).prop_map(
            |(base, length, scale_value, vertical)| {
                let mut ruler = RulerMark::new(base, length);
                ruler.scale_value = scale_value;
                if vertical {
                    ruler.orientation = Orientation::Vertical;
                }
                Mark::Ruler(ruler)
            }
        ),
        (base_strategy(), 0u32..500, 0u32..500).prop_map(|(base, width, height)| {
            Mark::Graph(GraphMark {
                base,
                shape: GraphShape::Triangle,
                width,
                height,
                filled: width % 2 == 0,
                line_thickness: 1,
            })
        }),
        (base_strategy(), -500i32..500, -500i32..500).prop_map(|(base, end_x, end_y)| {
            Mark::Line(LineMark {
                base,
                end_x,
                end_y,
                thickness: 2,
                style: LineStyle::Dotted,
            })
        }),
        (base_strategy(), 0u32..100).prop_map(|(base, radius)| {
            Mark::AvoidPoint(AvoidPointMark { base, radius })
        }),
    ]
}

/// Generate a complete, already-valid project state
fn state_strategy() -> impl Strategy<Value = ProjectState> {
    (
        prop::collection::vec(mark_strategy(), 0..12),
        MIN_ZOOM..MAX_ZOOM,
        (any::<i32>(), any::<i32>()),
        (any::<bool>(), any::<bool>(), any::<bool>()),
        prop::collection::vec(prop::collection::vec(mark_strategy(), 0..3), 0..4),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(marks, zoom, (ox, oy), (grid, boundary, dots), undo, pick)| {
            let selected_mark_index = if marks.is_empty() {
                NO_SELECTION
            } else {
                pick.index(marks.len()) as i32
            };
            ProjectState {
                marks,
                zoom_level: zoom,
                view_offset_x: ox,
                view_offset_y: oy,
                grid_visible: grid,
                material_boundary_visible: boundary,
                dot_preview_enabled: dots,
                selected_mark_index,
                undo_history: undo,
                ..Default::default()
            }
        })
}

fn document_from(state: &ProjectState) -> EditorDocument {
    let mut doc = EditorDocument::new();
    StateAccessor::new().apply(&mut doc, state).unwrap();
    doc
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_save_load_preserves_state(state in state_strategy(), compress in any::<bool>()) {
        let temp_dir = TempDir::new().unwrap();
        let strategy = if compress { CompressionStrategy::Fast } else { CompressionStrategy::None };
        let engine = SnapshotEngine::builder()
            .compression_strategy(strategy)
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap();

        let doc = document_from(&state);
        engine.save(&ProjectIdentity::new("prop"), &doc).unwrap();

        let mut restored = EditorDocument::new();
        let report = engine.load("prop", &mut restored).into_result().unwrap();
        prop_assert!(report.corrections.is_empty());
        prop_assert_eq!(report.compressed, compress);

        let expected = StateAccessor::new().capture(&doc).state;
        let actual = StateAccessor::new().capture(&restored).state;
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_codec_round_trip(state in state_strategy()) {
        let codec = SnapshotCodec::new();
        let decoded = codec.decode(&codec.encode(&state).unwrap()).unwrap();
        prop_assert!(decoded.marks_present);
        prop_assert_eq!(decoded.state, state);
    }

    #[test]
    fn prop_selection_always_valid_after_normalize(
        state in state_strategy(),
        selection in any::<i32>(),
        zoom in any::<f64>(),
    ) {
        let mut state = state;
        state.selected_mark_index = selection;
        state.zoom_level = zoom;
        state.normalize();

        let len = state.marks.len() as i64;
        let index = state.selected_mark_index as i64;
        prop_assert!(index == -1 || (0..len).contains(&index));
        prop_assert!(state.zoom_level.is_finite());
        prop_assert!(state.zoom_level >= MIN_ZOOM && state.zoom_level <= MAX_ZOOM);
    }

    #[test]
    fn prop_sanitized_names_are_safe_and_stable(name in "\\PC{1,40}") {
        let stem = sanitize_file_stem(&name);
        prop_assert_eq!(stem.chars().count(), name.chars().count());
        prop_assert!(stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
        prop_assert_eq!(sanitize_file_stem(&name), stem.clone());
        prop_assert_eq!(sanitize_file_stem(&stem), stem);
    }

    #[test]
    fn prop_compression_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let mut engine = CompressionEngine::new(CompressionStrategy::Fast);
        let stored = engine.maybe_compress(&data).unwrap();
        let read = engine.decompress_if_needed(&stored);
        prop_assert!(read.was_compressed);
        prop_assert_eq!(read.bytes, data);
    }
}
