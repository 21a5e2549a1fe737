//! Error types for the Keyhouse core crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A topic name does not match `<storeName>_v<versionNumber>`.
    #[error("malformed topic name: {0}")]
    MalformedTopic(String),
}

pub type Result<T> = std::result::Result<T, Error>;
