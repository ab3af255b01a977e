//! # docvault
//!
//! Content-addressable document locator, digest engine, and archive index.
//!
//! Documents live in a sharded directory tree under a storage root and are
//! named by opaque identifiers. Sets of documents are bundled into SQLite
//! archives named by a content digest, and an index maps identifiers to
//! digests and archive locations.
//!
//! ## Architecture
//!
//! ```text
//! identifier ──▶ Locator ──▶ {root}/{db}/{dir1}/{dir2}/{basename}
//!                  │            (shadow database first, then primary;
//!                  │             exact file, then `<basename>.*`)
//!                  ▼
//!               Reader ──▶ local file, or remote docman over HTTP
//!                  │
//!                  ▼
//!     documents ──▶ digest ──▶ archive {archive root}/{rev digest}/db.sqlite
//!                                   │
//!                                   ▼
//!                                 index (SQLite): identifier → digest → location
//! ```
//!
//! Pure logic (identifier parsing, sharding, digests, the index store trait)
//! lives in the `docvault-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`locate`] | Identifier → path resolution with shadow and suffix fallback |
//! | [`reader`] | Opening documents, with remote fallback |
//! | [`batch`] | Bounded parallel resolve, read, and hash |
//! | [`archive`] | The SQLite archive container |
//! | [`archive_cmd`] | Archive inspection |
//! | [`ingest`] | Archive store and delete flows |
//! | [`rebuild`] | Rebuilding the index from archives |
//! | [`sqlite_store`] | SQLite index store |
//! | [`progress`] | Rebuild progress reporting |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema migrations |

pub mod archive;
pub mod archive_cmd;
pub mod batch;
pub mod config;
pub mod db;
pub mod digest_cmd;
pub mod id_cmd;
pub mod index_cmd;
pub mod ingest;
pub mod locate;
pub mod migrate;
pub mod progress;
pub mod reader;
pub mod rebuild;
pub mod sqlite_store;

pub use docvault_core as core;
