// src/codec/mod.rs
//! Pluggable byte/object codecs
//!
//! - **SerdeRegistry**: default codec plus per-type bindings
//! - **Compressor**: zstd wrapper backing the `json_zstd` codec

pub mod compressor;
pub mod registry;

pub use compressor::{CompressionLevel, Compressor};
pub use registry::{CodecKey, SerdeRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire encodings understood by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    Json,
    Yaml,
    JsonZstd,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Json => "json",
            Codec::Yaml => "yaml",
            Codec::JsonZstd => "json_zstd",
        })
    }
}
