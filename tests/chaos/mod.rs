//! Chaos testing framework for marksnap
//!
//! Damages snapshot files, feeds the store failing sources and takes the
//! catalog away, then checks that nothing panics, prior snapshots survive and
//! every failed load names its stage.

use ::marksnap::mark::{MarkBase, RulerMark, TextMark};
use ::marksnap::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{info, warn};

/// Chaos testing framework
pub struct SnapshotChaosTest {
    pub engine: SnapshotEngine,
    pub temp_dir: TempDir,
    pub chaos_engine: ChaosEngine,
}

impl SnapshotChaosTest {
    pub fn new(strategy: CompressionStrategy) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::builder()
            .compression_strategy(strategy)
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::new()))
            .unwrap();

        Self {
            engine,
            temp_dir,
            chaos_engine: ChaosEngine::new(42),
        }
    }

    /// Save `count` projects and return their names
    pub fn create_test_projects(&mut self, count: usize) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for i in 0..count {
            let name = format!("chaos-{}", i);
            let doc = self.chaos_engine.random_document(i + 1);
            self.engine.save(&ProjectIdentity::new(&name), &doc)?;
            names.push(name);
        }
        Ok(names)
    }

    /// Run comprehensive chaos test suite
    pub fn run_chaos_suite(&mut self) -> anyhow::Result<ChaosReport> {
        let mut report = ChaosReport::default();
        let names = self.create_test_projects(8)?;

        info!("Testing snapshot corruption");
        for name in &names {
            let path = self.engine.snapshot_path(name)?;
            match self.chaos_engine.pick(3) {
                0 => self.chaos_engine.flip_random_bytes(&path, 4)?,
                1 => self.chaos_engine.truncate_randomly(&path)?,
                _ => self.chaos_engine.replace_with_garbage(&path)?,
            }
            report.corrupted_files += 1;

            let mut doc = EditorDocument::new();
            doc.add_mark(TextMark::new(MarkBase::at(0, 0), "sentinel").into());
            let outcome = self.engine.load(name, &mut doc);
            match outcome.failed_stage() {
                None => report.survived_corruption += 1,
                Some(stage) => {
                    assert!(stage.allows_fallback(), "corruption surfaced at {}", stage);
                    assert_eq!(doc.mark_list().len(), 1, "failed load touched the document");
                    if matches!(outcome, RestoreOutcome::MetadataOnly(_)) {
                        report.metadata_fallbacks += 1;
                    }
                    report.detected_corruption += 1;
                }
            }
        }

        info!("Testing recovery by saving over damaged files");
        for name in &names {
            let doc = self.chaos_engine.random_document(3);
            match self.engine.save(&ProjectIdentity::new(name), &doc) {
                Ok(_) => {
                    if self.engine.load(name, &mut EditorDocument::new()).is_complete() {
                        report.recoveries += 1;
                    }
                }
                Err(e) => warn!("Save over damaged '{}' failed: {}", name, e),
            }
        }

        Ok(report)
    }
}

/// Deterministic source of damage
pub struct ChaosEngine {
    rng: StdRng,
}

impl ChaosEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn pick(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }

    pub fn random_document(&mut self, marks: usize) -> EditorDocument {
        let mut doc = EditorDocument::new();
        for i in 0..marks {
            let x = self.rng.random_range(-1_000..1_000);
            let y = self.rng.random_range(-1_000..1_000);
            if self.rng.random::<bool>() {
                doc.add_mark(TextMark::new(MarkBase::at(x, y), format!("T{}", i)).into());
            } else {
                let length = self.rng.random_range(10..900);
                doc.add_mark(RulerMark::new(MarkBase::at(x, y), length).into());
            }
        }
        doc.set_zoom_level(self.rng.random_range(0.1..10.0)).unwrap();
        doc
    }

    pub fn flip_random_bytes(&mut self, path: &Path, count: usize) -> io::Result<()> {
        let mut bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(());
        }
        for _ in 0..count {
            let index = self.rng.random_range(0..bytes.len());
            bytes[index] ^= 0xFF;
        }
        fs::write(path, bytes)
    }

    pub fn truncate_randomly(&mut self, path: &Path) -> io::Result<()> {
        let bytes = fs::read(path)?;
        let keep = self.rng.random_range(0..bytes.len().max(1));
        fs::write(path, &bytes[..keep])
    }

    pub fn replace_with_garbage(&mut self, path: &Path) -> io::Result<()> {
        let len = self.rng.random_range(0..512);
        let garbage: Vec<u8> = (0..len).map(|_| self.rng.random()).collect();
        fs::write(path, garbage)
    }
}

#[derive(Debug, Default)]
pub struct ChaosReport {
    pub corrupted_files: usize,
    pub detected_corruption: usize,
    pub survived_corruption: usize,
    pub metadata_fallbacks: usize,
    pub recoveries: usize,
}

/// Source that fails after yielding some bytes
struct FailingReader {
    remaining: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "source vanished"));
        }
        let n = buf.len().min(self.remaining).min(7);
        buf[..n].fill(b'x');
        self.remaining -= n;
        Ok(n)
    }
}

#[cfg(test)]
mod chaos_tests {
    use super::*;

    #[test]
    fn test_chaos_suite_compressed() {
        let mut chaos = SnapshotChaosTest::new(CompressionStrategy::Fast);
        let report = chaos.run_chaos_suite().unwrap();
        assert_eq!(report.corrupted_files, 8);
        assert_eq!(report.detected_corruption + report.survived_corruption, 8);
        assert!(report.detected_corruption > 0);
        assert_eq!(report.metadata_fallbacks, report.detected_corruption);
        assert_eq!(report.recoveries, 8);
    }

    #[test]
    fn test_chaos_suite_raw() {
        let mut chaos = SnapshotChaosTest::new(CompressionStrategy::None);
        chaos.chaos_engine = ChaosEngine::new(7);
        let report = chaos.run_chaos_suite().unwrap();
        assert!(report.detected_corruption > 0);
        assert_eq!(report.recoveries, 8);
    }

    #[test]
    fn test_failing_source_keeps_prior_snapshot() {
        let chaos = SnapshotChaosTest::new(CompressionStrategy::Fast);
        let identity = ProjectIdentity::new("Bracket-07");
        let mut doc = EditorDocument::new();
        doc.add_mark(TextMark::new(MarkBase::at(10, 20), "A1").into());
        let saved = chaos.engine.save(&identity, &doc).unwrap();
        let before = fs::read(&saved.path).unwrap();

        for remaining in [0, 3, 11, 4096] {
            let mut source = FailingReader { remaining };
            let result = chaos.engine.store().save_from_reader("Bracket-07", &mut source);
            assert!(matches!(result, Err(SnapshotError::Io(_))));
            assert_eq!(fs::read(&saved.path).unwrap(), before);
        }

        let leftovers: Vec<_> = fs::read_dir(chaos.temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
        assert!(chaos.engine.load("Bracket-07", &mut EditorDocument::new()).is_complete());
    }

    #[test]
    fn test_unavailable_catalog_never_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let engine = SnapshotEngine::builder()
            .build(temp_dir.path(), Arc::new(InMemoryCatalog::unavailable()))
            .unwrap();
        let mut rng = ChaosEngine::new(3);

        for i in 0..5 {
            let name = format!("offline-{}", i);
            let report = engine
                .save(&ProjectIdentity::new(&name), &rng.random_document(4))
                .unwrap();
            assert!(!report.catalog_synced);

            let restored = engine
                .load(&name, &mut EditorDocument::new())
                .into_result()
                .unwrap();
            assert!(!restored.catalog_registered);
            assert_eq!(restored.warnings.len(), 1);
        }

        // No snapshot and no catalog: plain failure, no panic
        let outcome = engine.load("missing", &mut EditorDocument::new());
        assert!(matches!(outcome, RestoreOutcome::Failed(_)));
        assert_eq!(engine.list_projects().unwrap().names.len(), 5);
    }

    #[test]
    fn test_document_refusing_writes() {
        let chaos = SnapshotChaosTest::new(CompressionStrategy::Fast);
        let mut source = ChaosEngine::new(11);
        chaos
            .engine
            .save(&ProjectIdentity::new("stubborn"), &source.random_document(5))
            .unwrap();

        for field in [StateField::Reset, StateField::Marks, StateField::RedoHistory] {
            let mut doc = EditorDocument::new();
            doc.fail_write(field);
            let outcome = chaos.engine.load("stubborn", &mut doc);
            match outcome {
                RestoreOutcome::Failed(failure) => {
                    assert_eq!(failure.stage, RestoreStage::Applied);
                    assert!(matches!(
                        failure.error,
                        SnapshotError::Apply { field: f, .. } if f == field
                    ));
                }
                other => panic!("expected apply failure, got {:?}", other),
            }
            assert_eq!(doc.redraw_requests(), 0);
        }
    }

    #[test]
    fn test_backups_survive_canonical_damage() {
        let chaos = SnapshotChaosTest::new(CompressionStrategy::Fast);
        let mut source = ChaosEngine::new(5);
        let report = chaos
            .engine
            .save(&ProjectIdentity::new("kept"), &source.random_document(6))
            .unwrap();
        let backup = report.backup_path.unwrap();

        fs::write(&report.path, b"\x00\x01garbage").unwrap();
        assert!(!chaos.engine.load("kept", &mut EditorDocument::new()).is_complete());

        // A backup carries the same bytes and can be copied back
        fs::copy(&backup, &report.path).unwrap();
        assert!(chaos.engine.load("kept", &mut EditorDocument::new()).is_complete());
    }
}
