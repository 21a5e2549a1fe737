//! Error types for metadata repository operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    /// The backing metadata source could not be reached or refreshed.
    #[error("metadata repository unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
