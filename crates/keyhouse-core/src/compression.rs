//! Compression Strategies and the Version Compressor Registry
//!
//! Stored values are compressed per version. Most strategies are
//! self-contained, but dictionary-based compression needs a per-version
//! binary dictionary that lives on the storage nodes. A reader must hold the
//! dictionary in memory before it can decompress the first response for that
//! version.
//!
//! The [`CompressorRegistry`] is the process-wide map from topic name to its
//! ready-to-use [`VersionCompressor`]. Components that download dictionaries
//! install compressors here; the query path looks them up by topic.
//!
//! ## Thread Safety
//!
//! The registry is safe to share across tasks via `Arc<CompressorRegistry>`.
//! `install` is idempotent for a topic: the first installation wins and
//! concurrent duplicates are dropped.

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the values of a store version are compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressionStrategy {
    /// Values are stored uncompressed.
    NoOp,
    /// Gzip, no shared state between values.
    Gzip,
    /// Zstandard without a trained dictionary.
    Zstd,
    /// Zstandard with a per-version trained dictionary.
    ZstdWithDict,
}

impl CompressionStrategy {
    /// Whether this strategy needs a per-version dictionary before values
    /// can be decompressed.
    pub fn requires_dictionary(&self) -> bool {
        matches!(self, CompressionStrategy::ZstdWithDict)
    }
}

impl fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionStrategy::NoOp => "NO_OP",
            CompressionStrategy::Gzip => "GZIP",
            CompressionStrategy::Zstd => "ZSTD",
            CompressionStrategy::ZstdWithDict => "ZSTD_WITH_DICT",
        };
        f.write_str(name)
    }
}

/// A decompressor for one store version.
///
/// Holds the strategy and, for dictionary-based strategies, the raw
/// dictionary bytes downloaded from a storage node.
#[derive(Debug, Clone)]
pub struct VersionCompressor {
    strategy: CompressionStrategy,
    dictionary: Bytes,
}

impl VersionCompressor {
    pub fn new(strategy: CompressionStrategy, dictionary: Bytes) -> Self {
        Self {
            strategy,
            dictionary,
        }
    }

    pub fn strategy(&self) -> CompressionStrategy {
        self.strategy
    }

    pub fn dictionary(&self) -> &Bytes {
        &self.dictionary
    }
}

/// Process-wide map from topic name to its version compressor.
#[derive(Debug, Default)]
pub struct CompressorRegistry {
    compressors: DashMap<String, Arc<VersionCompressor>>,
}

impl CompressorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a compressor is installed for this topic.
    pub fn has(&self, topic: &str) -> bool {
        self.compressors.contains_key(topic)
    }

    /// Install a compressor for a topic if none exists yet.
    ///
    /// Idempotent: a second installation for the same topic is dropped, so
    /// racing installers cannot replace a compressor that readers may
    /// already be using.
    pub fn install(&self, strategy: CompressionStrategy, topic: &str, dictionary: Bytes) {
        self.compressors
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(VersionCompressor::new(strategy, dictionary)));
    }

    /// Remove the compressor for a topic. Returns whether one was present.
    pub fn remove(&self, topic: &str) -> bool {
        self.compressors.remove(topic).is_some()
    }

    /// Look up the compressor for a topic.
    pub fn get(&self, topic: &str) -> Option<Arc<VersionCompressor>> {
        self.compressors
            .get(topic)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.compressors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compressors.is_empty()
    }
}
