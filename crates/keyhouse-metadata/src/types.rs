//! Metadata Type Definitions
//!
//! ## Types Overview
//!
//! ### Store
//! A named dataset. Holds the list of its currently known numbered versions.
//!
//! ### Version
//! One immutable push of a store's data. Carries the lifecycle status and
//! the compression strategy its values were written with.
//!
//! ### VersionStatus
//! Lifecycle of a version from creation through serving to retirement.
//! Only `Online` versions are servable.

use keyhouse_core::{topic, CompressionStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a store version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    NotCreated,
    Started,
    Pushed,
    Online,
    Error,
    Killed,
}

impl VersionStatus {
    /// Whether a version in this status may serve reads.
    pub fn is_servable(&self) -> bool {
        matches!(self, VersionStatus::Online)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VersionStatus::NotCreated => "NOT_CREATED",
            VersionStatus::Started => "STARTED",
            VersionStatus::Pushed => "PUSHED",
            VersionStatus::Online => "ONLINE",
            VersionStatus::Error => "ERROR",
            VersionStatus::Killed => "KILLED",
        };
        f.write_str(name)
    }
}

/// One immutable version of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Name of the owning store.
    pub store_name: String,

    /// Version number, monotonically assigned per store.
    pub number: u32,

    /// Lifecycle status.
    pub status: VersionStatus,

    /// Compression strategy the version's values were written with.
    pub compression_strategy: CompressionStrategy,
}

impl Version {
    pub fn new(
        store_name: impl Into<String>,
        number: u32,
        status: VersionStatus,
        compression_strategy: CompressionStrategy,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            number,
            status,
            compression_strategy,
        }
    }

    /// The canonical topic name of this version.
    pub fn topic_name(&self) -> String {
        topic::compose(&self.store_name, self.number)
    }

    /// Whether this version needs a compression dictionary loaded before it
    /// can be served: dictionary-based compression and `Online` status.
    pub fn is_dictionary_eligible(&self) -> bool {
        self.compression_strategy.requires_dictionary() && self.status.is_servable()
    }
}

/// A named dataset and its known versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub name: String,
    pub versions: Vec<Version>,
}

impl Store {
    pub fn new(name: impl Into<String>, versions: Vec<Version>) -> Self {
        Self {
            name: name.into(),
            versions,
        }
    }

    /// Look up a version by number.
    pub fn version(&self, number: u32) -> Option<&Version> {
        self.versions.iter().find(|v| v.number == number)
    }
}
