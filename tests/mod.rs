//! Main test module for marksnap
//!
//! This module includes all test suites:
//! - Integration tests for complete save/load workflows
//! - Chaos tests for corruption and failing collaborators
//! - Property-based tests for invariants

pub mod chaos;
pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::marksnap::mark::{
        AvoidPointMark, BowTextMark, ChartMark, CodeMatrixMark, CodeSymbology, GraphMark,
        GraphShape, LineMark, LineStyle, MarkBase, Orientation, RulerMark, TextMark,
    };
    use ::marksnap::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine_in(dir: &TempDir) -> SnapshotEngine {
        SnapshotEngine::builder()
            .build(dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap()
    }

    #[test]
    fn test_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_in(&temp_dir);

        engine.save(&ProjectIdentity::new("blank"), &EditorDocument::new()).unwrap();

        let mut doc = EditorDocument::new();
        doc.add_mark(TextMark::new(MarkBase::at(1, 1), "old").into());
        let report = engine.load("blank", &mut doc).into_result().unwrap();
        assert_eq!(report.mark_count, 0);
        assert!(doc.mark_list().is_empty());
    }

    #[test]
    fn test_every_mark_kind_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_in(&temp_dir);

        let mut ruler = RulerMark::new(MarkBase::at(0, 100), 120);
        ruler.orientation = Orientation::Vertical;
        ruler.scale_value = 2.5;
        ruler.color = 0xFF8800;
        let marks: Vec<Mark> = vec![
            TextMark::new(MarkBase::at(10, 20), "A1").into(),
            Mark::BowText(BowTextMark {
                base: MarkBase::at(5, 5),
                text: "ARC".to_string(),
                font_family: "Serif".to_string(),
                font_size: 14,
                radius: 80,
                start_angle: 22.5,
                clockwise: false,
            }),
            Mark::CodeMatrix(CodeMatrixMark {
                base: MarkBase { drag_enabled: false, ..MarkBase::at(30, 30) },
                content: "SN-0001".to_string(),
                symbology: CodeSymbology::QrCode,
                module_size: 3,
                quiet_zone: 2,
            }),
            Mark::Graph(GraphMark {
                base: MarkBase::at(-4, 7),
                shape: GraphShape::Ellipse,
                width: 40,
                height: 20,
                filled: true,
                line_thickness: 2,
            }),
            Mark::Chart(ChartMark {
                base: MarkBase::at(0, 0),
                source: "logo.svg".to_string(),
                width: 64,
                height: 64,
                keep_aspect_ratio: true,
            }),
            Mark::Line(LineMark {
                base: MarkBase::at(1, 2),
                end_x: 300,
                end_y: 2,
                thickness: 1,
                style: LineStyle::Dashed,
            }),
            ruler.into(),
            Mark::AvoidPoint(AvoidPointMark {
                base: MarkBase::at(200, 200),
                radius: 15,
            }),
        ];

        let mut doc = EditorDocument::new();
        for mark in &marks {
            doc.add_mark(mark.clone());
        }
        doc.select(6);
        engine.save(&ProjectIdentity::new("all-kinds"), &doc).unwrap();

        let mut restored = EditorDocument::new();
        engine.load("all-kinds", &mut restored).into_result().unwrap();
        assert_eq!(restored.marks().unwrap(), marks);
        assert_eq!(restored.selected_mark_index().unwrap(), 6);
    }

    #[test]
    fn test_special_project_names() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_in(&temp_dir);

        let names = [
            "name with spaces",
            "Ümlaut",
            "../escape",
            "a:b*c?d",
            "tab\tname",
            "v1.2_final-3",
        ];
        for name in &names {
            let report = engine.save(&ProjectIdentity::new(*name), &EditorDocument::new()).unwrap();
            assert_eq!(report.path.parent().unwrap(), temp_dir.path());
            let file_name = report.path.file_name().unwrap().to_str().unwrap();
            assert!(file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
            assert!(engine.load(name, &mut EditorDocument::new()).is_complete());
        }
        assert!(!temp_dir.path().parent().unwrap().join("escape.mksnap").exists());
    }

    #[test]
    fn test_names_that_sanitize_alike_share_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_in(&temp_dir);

        let a = engine.save(&ProjectIdentity::new("a/b"), &EditorDocument::new()).unwrap();
        let b = engine.save(&ProjectIdentity::new("a:b"), &EditorDocument::new()).unwrap();
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn test_version_one_snapshot_loads() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_in(&temp_dir);
        fs::write(
            temp_dir.path().join("legacy.mksnap"),
            br#"MKSNAP 1.0
{"project_id":"3f1c","project_name":"legacy","grid_visible":true,
 "marks":[{"kind":"text","x":4,"y":5,"text":"OLD"}]}"#,
        )
        .unwrap();

        let mut doc = EditorDocument::new();
        let report = engine.load("legacy", &mut doc).into_result().unwrap();
        assert_eq!(report.format_version, "1.0");
        assert!(!report.compressed);
        assert!(doc.grid_visible().unwrap());
        assert!(doc.material_boundary_visible().unwrap());
        assert!(doc.undo_history().unwrap().is_empty());
        assert_eq!(doc.marks().unwrap()[0].as_text().map(|t| t.font_size), Some(12));
    }

    #[test]
    fn test_project_dir_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        let engine = SnapshotEngine::builder()
            .build(&file, Arc::new(InMemoryCatalog::new()))
            .unwrap();

        let err = engine
            .save(&ProjectIdentity::new("p"), &EditorDocument::new())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::ProjectDirectory(_)));
    }

    #[test]
    fn test_large_document() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_in(&temp_dir);
        let mut doc = EditorDocument::new();
        for i in 0..5_000 {
            let base = MarkBase::at(i % 400, i / 400);
            doc.add_mark(TextMark::new(base, format!("L{:05}", i)).into());
        }

        let report = engine.save(&ProjectIdentity::new("big"), &doc).unwrap();
        assert!(report.bytes_written < report.encoded_size);

        let mut restored = EditorDocument::new();
        engine.load("big", &mut restored).into_result().unwrap();
        assert_eq!(restored.mark_list().len(), 5_000);
        assert_eq!(restored.marks().unwrap(), doc.marks().unwrap());
    }
}
