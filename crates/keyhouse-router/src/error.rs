//! Error types for the Keyhouse router.
//!
//! ## Error Categories
//!
//! ### Fetch Errors
//! [`FetchError`] covers one dictionary download attempt. Every kind is
//! transient from the service's point of view: the topic goes back on the
//! candidate queue and is retried until the version retires.
//!
//! ### Service Errors
//! [`RouterError`] covers lifecycle operations. `WarmupFailed` is fatal to
//! startup; the embedding process must refuse to serve traffic.

use keyhouse_metadata::MetadataError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single dictionary download attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No ready-to-serve replica could be resolved for the topic.
    #[error("no ready-to-serve replica for {topic}")]
    NoReplica { topic: String },

    /// The storage node answered with a non-success status code.
    #[error("dictionary fetch from {url} returned HTTP {status}")]
    HttpStatus { status: u16, url: String },

    /// The response body was empty or could not be read.
    #[error("empty or unreadable dictionary response from {url}")]
    BadResponse { url: String },

    /// The request did not complete within the per-fetch deadline.
    #[error("dictionary fetch from {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Connection-level failure.
    #[error("transport failure fetching dictionary from {url}: {detail}")]
    Transport { url: String, detail: String },
}

/// Failure of a lifecycle operation on the retrieval service.
#[derive(Debug, Error)]
pub enum RouterError {
    /// `start()` was called on a service that is not freshly created.
    #[error("dictionary retrieval service already started")]
    AlreadyStarted,

    /// The startup warm-up did not install every required dictionary.
    #[error("dictionary warm-up failed: {detail}")]
    WarmupFailed { detail: String },

    /// The metadata repository failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The HTTP transport could not be constructed.
    #[error("http transport error: {0}")]
    Transport(String),
}

/// Failure of an instance directory lookup.
#[derive(Debug, Error)]
#[error("instance directory lookup failed: {0}")]
pub struct DirectoryError(pub String);

pub type Result<T> = std::result::Result<T, RouterError>;
