// src/codec/compressor.rs
//! zstd compression for the `json_zstd` codec

use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::trace;

/// Upper bound on a decompressed record
pub const MAX_DECOMPRESSED_BYTES: u64 = 64 << 20;

/// zstd level, either named or explicit
///
/// Explicit levels are clamped into the range the linked zstd supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Level 1, for hot capture paths
    Fast,

    #[default]
    Balanced,

    /// Level 19, for archival stores
    Best,

    Level(i32),
}

impl CompressionLevel {
    pub fn as_i32(&self) -> i32 {
        match *self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 3,
            CompressionLevel::Best => 19,
            CompressionLevel::Level(level) => {
                let range = zstd::compression_level_range();
                level.clamp(*range.start(), *range.end())
            }
        }
    }
}

/// zstd wrapper with a bounded decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    level: CompressionLevel,
}

impl Compressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let level = self.level.as_i32();
        let out = zstd::bulk::compress(data, level)
            .map_err(|e| EngineError::CompressionFailed(format!("zstd level {}: {}", level, e)))?;

        trace!("zstd {} -> {} bytes", data.len(), out.len());
        Ok(out)
    }

    /// Decompress, refusing output beyond `MAX_DECOMPRESSED_BYTES`
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| EngineError::CompressionFailed(format!("zstd decoder: {}", e)))?;

        let mut out = Vec::with_capacity(data.len() * 3);
        decoder
            .take(MAX_DECOMPRESSED_BYTES + 1)
            .read_to_end(&mut out)
            .map_err(|e| EngineError::CompressionFailed(format!("zstd frame: {}", e)))?;

        if out.len() as u64 > MAX_DECOMPRESSED_BYTES {
            return Err(EngineError::CompressionFailed(format!(
                "decompressed record exceeds {} bytes",
                MAX_DECOMPRESSED_BYTES
            )));
        }

        Ok(out)
    }
}
