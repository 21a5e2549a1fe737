//! Core types for the Keyhouse serving platform.
//!
//! Keyhouse stores datasets as immutable, numbered versions. Every version of
//! a store maps to a *topic*, the canonical string identifier
//! `<storeName>_v<versionNumber>` used as the primary key across the
//! metadata plane, the storage nodes, and the routers.
//!
//! This crate holds the vocabulary shared by every component:
//!
//! - [`topic`]: composing and parsing topic names
//! - [`compression`]: compression strategies and the per-version compressor
//!   registry used on the read path
//! - [`error`]: the core error type

pub mod compression;
pub mod error;
pub mod topic;

pub use compression::{CompressionStrategy, CompressorRegistry, VersionCompressor};
pub use error::{Error, Result};
