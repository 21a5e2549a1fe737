//! Keyhouse Metadata - Stores, Versions, and Change Notification
//!
//! The metadata plane tracks which stores exist, which numbered versions
//! each store has, and the lifecycle status and compression strategy of
//! every version. Routers and storage nodes consume a read-only snapshot of
//! this state and subscribe to change events.
//!
//! ## Components
//!
//! - [`Store`] / [`Version`] / [`VersionStatus`]: the metadata types
//! - [`MetadataRepository`]: read-only async access to the cached snapshot
//! - [`StoreDataChangedListener`]: callbacks fired on store create, change,
//!   and delete
//! - [`InMemoryMetadataRepository`]: snapshot-backed implementation used by
//!   embedding processes and tests; the production repository that mirrors
//!   the cluster coordinator lives outside this crate
//!
//! ## Thread Safety
//!
//! Repositories are shared as `Arc<dyn MetadataRepository>`. Listener
//! callbacks may be delivered on arbitrary threads and must be internally
//! synchronized.

pub mod error;
pub mod repository;
pub mod types;

pub use error::{MetadataError, Result};
pub use repository::{InMemoryMetadataRepository, MetadataRepository, StoreDataChangedListener};
pub use types::{Store, Version, VersionStatus};
