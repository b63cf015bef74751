//! LZ4 compression adapter for snapshots
//!
//! This module optionally wraps codec output in an LZ4 frame and unwraps it
//! again on read.
//!
//! ## Reading without a flag
//!
//! Nothing stored alongside a snapshot says whether it was compressed, and the
//! file extension is the same either way. Older or differently configured
//! writers may have produced either form, so the reader uses two attempts:
//!
//! 1. Decode the bytes as an LZ4 frame.
//! 2. If that fails, hand the bytes on unchanged as raw codec output.
//!
//! The codec then rejects anything that is neither.
//!
//! ## Compression Strategies
//!
//! - **None**: Always write raw codec output
//! - **Fast**: Compress every snapshot (default)
//! - **Adaptive**: Compress only snapshots of at least `min_size` bytes
//!
//! ## Examples
//!
//! ```rust
//! use marksnap::compression::{CompressionEngine, CompressionStrategy};
//!
//! let mut engine = CompressionEngine::new(CompressionStrategy::Fast);
//! let payload = b"MKSNAP 2.0\n{\"marks\":[]}".repeat(20);
//!
//! let stored = engine.maybe_compress(&payload).unwrap();
//! let read = engine.decompress_if_needed(&stored);
//! assert!(read.was_compressed);
//! assert_eq!(read.bytes, payload);
//! ```

use crate::error::{Result, SnapshotError};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// First four bytes of every LZ4 frame (little endian 0x184D2204)
const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// When snapshots are compressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Never compress
    None,

    /// Compress every snapshot (default)
    Fast,

    /// Compress snapshots of at least `min_size` bytes
    Adaptive {
        /// Smaller payloads are written raw
        min_size: usize,
    },
}

impl Default for CompressionStrategy {
    fn default() -> Self {
        CompressionStrategy::Fast
    }
}

/// Compression statistics for monitoring
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Number of payloads written as LZ4 frames
    pub payloads_compressed: usize,
    /// Number of payloads written raw
    pub payloads_stored_raw: usize,
    /// Number of reads that found an LZ4 frame
    pub frames_read: usize,
    /// Number of reads that fell back to raw bytes
    pub raw_reads: usize,
    /// Total bytes saved by compression (negative savings count as zero)
    pub bytes_saved: usize,
    /// Total compression time in milliseconds
    pub compression_time_ms: u64,
    /// Total decompression time in milliseconds
    pub decompression_time_ms: u64,
}

impl CompressionStats {
    /// Fraction of written payloads that were compressed (0.0 to 1.0)
    pub fn compression_ratio(&self) -> f64 {
        let total = self.payloads_compressed + self.payloads_stored_raw;
        if total == 0 {
            return 0.0;
        }
        self.payloads_compressed as f64 / total as f64
    }
}

/// Bytes produced by [`CompressionEngine::decompress_if_needed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompressed {
    /// Raw codec bytes
    pub bytes: Vec<u8>,
    /// Whether the input was an LZ4 frame
    pub was_compressed: bool,
}

/// Snapshot compression engine
///
/// The engine is not thread-safe; the snapshot engine keeps it behind a
/// mutex.
#[derive(Debug)]
pub struct CompressionEngine {
    strategy: CompressionStrategy,
    stats: CompressionStats,
}

impl CompressionEngine {
    /// Create a new compression engine with the specified strategy
    pub fn new(strategy: CompressionStrategy) -> Self {
        Self {
            strategy,
            stats: CompressionStats::default(),
        }
    }

    /// Strategy in use
    pub fn strategy(&self) -> &CompressionStrategy {
        &self.strategy
    }

    /// Get current compression statistics
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = CompressionStats::default();
    }

    /// Whether a payload of `size` bytes would be compressed
    pub fn should_compress(&self, size: usize) -> bool {
        match &self.strategy {
            CompressionStrategy::None => false,
            CompressionStrategy::Fast => true,
            CompressionStrategy::Adaptive { min_size } => size >= *min_size,
        }
    }

    /// Compress codec output if the strategy asks for it
    ///
    /// Returns either an LZ4 frame or the input unchanged. Unlike content
    /// stores, the frame is kept even when it is larger than the input, so
    /// the on-disk form always follows the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Compression`] if the frame encoder fails.
    pub fn maybe_compress(&mut self, content: &[u8]) -> Result<Vec<u8>> {
        if !self.should_compress(content.len()) {
            trace!("Writing {} byte snapshot raw (strategy)", content.len());
            self.stats.payloads_stored_raw += 1;
            return Ok(content.to_vec());
        }

        let start = Instant::now();
        let mut encoder = FrameEncoder::new(Vec::with_capacity(content.len() / 2 + 64));
        encoder
            .write_all(content)
            .map_err(|e| SnapshotError::compression(format!("LZ4 frame write failed: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| SnapshotError::compression(format!("LZ4 frame finish failed: {}", e)))?;

        let saved = content.len().saturating_sub(compressed.len());
        self.stats.payloads_compressed += 1;
        self.stats.bytes_saved += saved;
        self.stats.compression_time_ms += start.elapsed().as_millis() as u64;

        debug!(
            "Compressed snapshot: {} -> {} bytes (saved {} bytes)",
            content.len(),
            compressed.len(),
            saved
        );
        Ok(compressed)
    }

    /// Decompress if the bytes are an LZ4 frame, otherwise pass them through
    ///
    /// This never fails: anything that does not decode as a frame is treated
    /// as raw codec output and left for the codec to judge. Input without the
    /// frame magic, including empty input, is never handed to the decoder.
    pub fn decompress_if_needed(&mut self, content: &[u8]) -> Decompressed {
        if !looks_compressed(content) {
            trace!("Not an LZ4 frame, reading {} bytes raw", content.len());
            return self.read_raw(content);
        }

        let start = Instant::now();
        let mut decoded = Vec::with_capacity(content.len() * 3);
        match FrameDecoder::new(content).read_to_end(&mut decoded) {
            Ok(_) => {
                self.stats.frames_read += 1;
                self.stats.decompression_time_ms += start.elapsed().as_millis() as u64;
                trace!("Decompressed {} bytes to {} bytes", content.len(), decoded.len());
                Decompressed {
                    bytes: decoded,
                    was_compressed: true,
                }
            }
            Err(e) => {
                warn!("Bytes carry an LZ4 frame header but failed to decode: {}", e);
                self.read_raw(content)
            }
        }
    }

    fn read_raw(&mut self, content: &[u8]) -> Decompressed {
        self.stats.raw_reads += 1;
        Decompressed {
            bytes: content.to_vec(),
            was_compressed: false,
        }
    }
}

/// Whether bytes start like an LZ4 frame
pub fn looks_compressed(content: &[u8]) -> bool {
    content.starts_with(&LZ4_FRAME_MAGIC)
}
