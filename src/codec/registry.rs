// src/codec/registry.rs
//! Codec registry with per-type overrides

use super::compressor::{CompressionLevel, Compressor};
use super::Codec;
use crate::utils::config::CodecSettings;
use crate::utils::errors::{EngineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Types that may be bound to a non-default codec by configuration
pub trait CodecKey {
    const CODEC_KEY: &'static str;
}

/// Byte/object conversion used by every component that persists data
#[derive(Debug, Clone)]
pub struct SerdeRegistry {
    default: Codec,
    bindings: HashMap<String, Codec>,
    compressor: Compressor,
}

impl SerdeRegistry {
    pub fn new(default: Codec) -> Self {
        Self {
            default,
            bindings: HashMap::new(),
            compressor: Compressor::default(),
        }
    }

    pub fn from_settings(settings: &CodecSettings) -> Self {
        let mut registry =
            Self::new(settings.default).with_compression(settings.compression_level);
        for (key, codec) in &settings.bindings {
            registry = registry.with_binding(key.clone(), *codec);
        }
        registry
    }

    /// Bind a codec key to a codec other than the default
    pub fn with_binding(mut self, key: impl Into<String>, codec: Codec) -> Self {
        self.bindings.insert(key.into(), codec);
        self
    }

    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.compressor = Compressor::new(level);
        self
    }

    pub fn default_codec(&self) -> Codec {
        self.default
    }

    /// Codec used for a given key, falling back to the default
    pub fn codec_for(&self, key: &str) -> Codec {
        self.bindings.get(key).copied().unwrap_or(self.default)
    }

    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        self.serialize_with(self.default, value)
    }

    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        self.deserialize_with(self.default, bytes)
    }

    /// Serialize with the codec bound to `T`
    pub fn encode<T: Serialize + CodecKey>(&self, value: &T) -> Result<Vec<u8>> {
        self.serialize_with(self.codec_for(T::CODEC_KEY), value)
    }

    /// Deserialize with the codec bound to `T`
    pub fn decode<T: DeserializeOwned + CodecKey>(&self, bytes: &[u8]) -> Result<T> {
        self.deserialize_with(self.codec_for(T::CODEC_KEY), bytes)
    }

    pub fn serialize_with<T: Serialize + ?Sized>(&self, codec: Codec, value: &T) -> Result<Vec<u8>> {
        match codec {
            Codec::Json => serde_json::to_vec(value).map_err(|e| EngineError::serde(codec, e)),
            Codec::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| EngineError::serde(codec, e)),
            Codec::JsonZstd => {
                let json = serde_json::to_vec(value).map_err(|e| EngineError::serde(codec, e))?;
                self.compressor
                    .compress(&json)
                    .map_err(|e| EngineError::serde(codec, e))
            }
        }
    }

    pub fn deserialize_with<T: DeserializeOwned>(&self, codec: Codec, bytes: &[u8]) -> Result<T> {
        match codec {
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| EngineError::serde(codec, e)),
            Codec::Yaml => serde_yaml::from_slice(bytes).map_err(|e| EngineError::serde(codec, e)),
            Codec::JsonZstd => {
                let json = self
                    .compressor
                    .decompress(bytes)
                    .map_err(|e| EngineError::serde(codec, e))?;
                serde_json::from_slice(&json).map_err(|e| EngineError::serde(codec, e))
            }
        }
    }

    /// Decode bytes into a generic document tree
    pub fn decode_value(&self, codec: Codec, bytes: &[u8]) -> Result<Value> {
        self.deserialize_with(codec, bytes)
    }

    /// Update `existing` in place from a partial document
    ///
    /// Fields present in `bytes` replace those of `existing`; `null` removes
    /// a field; everything else is left untouched (RFC 7386 merge patch).
    pub fn deserialize_into<T>(&self, bytes: &[u8], existing: &mut T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let patch = self.decode_value(self.default, bytes)?;
        let mut document =
            serde_json::to_value(&*existing).map_err(|e| EngineError::serde(Codec::Json, e))?;

        json_patch::merge(&mut document, &patch);

        *existing =
            serde_json::from_value(document).map_err(|e| EngineError::serde(self.default, e))?;
        Ok(())
    }
}

impl Default for SerdeRegistry {
    fn default() -> Self {
        Self::new(Codec::Json)
    }
}
