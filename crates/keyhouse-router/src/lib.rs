//! Keyhouse Read-Router Components
//!
//! The read-router sits between clients and the storage nodes. Responses for
//! versions written with dictionary-based compression cannot be decompressed
//! until the router holds that version's dictionary in memory, so the router
//! runs a [`DictionaryRetrievalService`] that keeps the in-memory dictionary
//! set exactly synchronized with the set of servable versions.
//!
//! ## Modules
//!
//! - [`dictionary`]: the retrieval service itself (change listener, download
//!   queue and consumer, retry, warm-up, lifecycle)
//! - [`fetcher`]: one HTTP GET per dictionary against a storage node
//! - [`instance`]: storage node addressing and replica selection
//! - [`handle`]: per-topic download state tracking
//! - [`queue`]: the download candidate queue
//! - [`config`]: router configuration

pub mod config;
pub mod dictionary;
pub mod error;
pub mod fetcher;
pub mod handle;
pub mod instance;
pub mod queue;

pub use config::RouterConfig;
pub use dictionary::DictionaryRetrievalService;
pub use error::{DirectoryError, FetchError, RouterError};
pub use fetcher::DictionaryFetcher;
pub use handle::{FailureCause, FetchHandle, FetchState};
pub use instance::{Instance, InstanceDirectory, ReplicaPicker, StaticInstanceDirectory};
pub use queue::CandidateQueue;
