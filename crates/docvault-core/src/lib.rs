//! # docvault core
//!
//! Pure logic shared by the docvault tools: identifier parsing, shard and
//! archive-path derivation, content digests, index models, and the index
//! store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-bound dependencies. Resolution against a real storage root and
//! the SQLite index live in the `docvault` crate.

pub mod digest;
pub mod error;
pub mod identifier;
pub mod models;
pub mod shard;
pub mod store;

pub use error::{Error, Result};
