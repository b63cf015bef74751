//! Integration tests for marksnap
//!
//! Complete workflows across engine instances, catalogs on disk and shared
//! documents.

#[cfg(test)]
mod integration_tests {
    use ::marksnap::mark::{MarkBase, RulerMark, TextMark};
    use ::marksnap::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_document() -> EditorDocument {
        let mut doc = EditorDocument::new();
        doc.add_mark(TextMark::new(MarkBase::at(10, 20), "A1").into());
        doc.add_mark(RulerMark::new(MarkBase::at(50, 50), 300).into());
        doc.set_zoom_level(2.0).unwrap();
        doc.set_view_offset_x(-120).unwrap();
        doc.set_view_offset_y(35).unwrap();
        doc.set_dot_preview_enabled(true).unwrap();
        doc.set_legacy_text_marks(vec![TextMark::new(MarkBase::at(10, 20), "A1")])
            .unwrap();
        doc.push_undo();
        doc.add_mark(TextMark::new(MarkBase::at(0, 90), "B2").into());
        doc.select(2);
        doc
    }

    #[test]
    fn test_basic_workflow() {
        let projects = TempDir::new().unwrap();
        let catalog_dir = TempDir::new().unwrap();
        let catalog = Arc::new(JsonCatalog::new(catalog_dir.path()));
        catalog.initialize().unwrap();

        let engine = SnapshotEngine::builder()
            .compression_strategy(CompressionStrategy::Fast)
            .build(projects.path(), catalog.clone())
            .unwrap();

        let identity = ProjectIdentity::new("Bracket-07").with_description("Left bracket");
        let doc = sample_document();
        let saved = engine.save(&identity, &doc).unwrap();
        assert!(saved.is_clean());

        let listing = engine.list_projects().unwrap();
        assert_eq!(listing.source, ListingSource::Catalog);
        assert_eq!(listing.names, vec!["Bracket-07".to_string()]);

        let mut restored = EditorDocument::new();
        let report = engine.load("Bracket-07", &mut restored).into_result().unwrap();
        assert_eq!(report.project, identity);

        let before = StateAccessor::new().capture(&doc).state;
        let after = StateAccessor::new().capture(&restored).state;
        assert_eq!(after, before);
        assert!(engine.reconcile().unwrap().is_consistent());
    }

    #[test]
    fn test_compression_is_transparent_to_readers() {
        let temp_dir = TempDir::new().unwrap();
        let writer = SnapshotEngine::builder()
            .compression_strategy(CompressionStrategy::Fast)
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap();
        let raw_writer = SnapshotEngine::builder()
            .compression_strategy(CompressionStrategy::None)
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap();
        let doc = sample_document();

        writer.save(&ProjectIdentity::new("packed"), &doc).unwrap();
        raw_writer.save(&ProjectIdentity::new("plain"), &doc).unwrap();

        // Any reader configuration handles both
        for reader in [&writer, &raw_writer] {
            let mut packed = EditorDocument::new();
            let mut plain = EditorDocument::new();
            let packed_report = reader.load("packed", &mut packed).into_result().unwrap();
            let plain_report = reader.load("plain", &mut plain).into_result().unwrap();
            assert!(packed_report.compressed);
            assert!(!plain_report.compressed);
            assert_eq!(packed.marks().unwrap(), plain.marks().unwrap());
        }
        let stats = writer.compression_stats();
        assert_eq!(stats.payloads_compressed, 1);
        assert_eq!(stats.frames_read, 1);
        assert_eq!(stats.raw_reads, 1);
    }

    #[test]
    fn test_adaptive_compression_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::builder()
            .compression_strategy(CompressionStrategy::Adaptive { min_size: 4096 })
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap();

        let small = engine.save(&ProjectIdentity::new("small"), &EditorDocument::new()).unwrap();
        assert!(!small.compressed);

        let mut big = EditorDocument::new();
        for i in 0..200 {
            big.add_mark(TextMark::new(MarkBase::at(i, i), "serial").into());
        }
        let large = engine.save(&ProjectIdentity::new("large"), &big).unwrap();
        assert!(large.compressed);
    }

    #[test]
    fn test_config_file_drives_engine() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("marksnap.json");
        fs::write(
            &config_path,
            format!(
                r#"{{"project_dir":{:?},"compression":{{"mode":"none"}},"backups_enabled":false}}"#,
                temp_dir.path().join("p")
            ),
        )
        .unwrap();

        let config = PersistenceConfig::from_json_file(&config_path).unwrap();
        let engine = SnapshotEngine::new(config, Arc::new(InMemoryCatalog::new())).unwrap();
        let report = engine.save(&ProjectIdentity::new("cfg"), &sample_document()).unwrap();
        assert!(!report.compressed);
        assert!(report.backup_path.is_none());
        assert!(temp_dir.path().join("p").join("cfg.mksnap").is_file());
    }

    #[test]
    fn test_json_catalog_registered_after_load() {
        let projects = TempDir::new().unwrap();
        let catalog_dir = TempDir::new().unwrap();

        // Written while the catalog was down
        let offline = SnapshotEngine::builder()
            .build(projects.path(), Arc::new(JsonCatalog::new(catalog_dir.path())))
            .unwrap();
        let saved = offline.save(&ProjectIdentity::new("orphan"), &sample_document()).unwrap();
        assert!(!saved.catalog_synced);

        let catalog = Arc::new(JsonCatalog::new(catalog_dir.path()));
        catalog.initialize().unwrap();
        let online = SnapshotEngine::builder()
            .build(projects.path(), catalog.clone())
            .unwrap();
        assert_eq!(online.reconcile().unwrap().orphaned_snapshots, vec!["orphan".to_string()]);

        let report = online
            .load("orphan", &mut EditorDocument::new())
            .into_result()
            .unwrap();
        assert!(report.catalog_registered);
        assert_eq!(catalog.list_projects().unwrap(), vec!["orphan".to_string()]);
        assert!(online.reconcile().unwrap().is_consistent());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_background_saves_of_shared_documents() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::builder()
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let mut doc = EditorDocument::new();
            for j in 0..=i {
                doc.add_mark(TextMark::new(MarkBase::at(j, j), "x").into());
            }
            let shared = share(doc);
            let identity = ProjectIdentity::new(format!("doc-{}", i));
            handles.push(engine.spawn_save(identity, &shared).unwrap());
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..4 {
            let shared = share(EditorDocument::new());
            let outcome = engine.load_shared(&format!("doc-{}", i), &shared);
            assert_eq!(outcome.report().map(|r| r.mark_count), Some(i + 1));
        }
        assert_eq!(engine.list_projects().unwrap().names.len(), 4);
    }
}
