//! # CaskDB Core
//!
//! An embeddable persistent key-value store in the Bitcask model:
//! - Append-only segmented log of checksummed records
//! - In-memory key directory mapping each key to its latest record
//! - Logical deletes via a tombstone sentinel, reclaimed by merge
//! - Hint files and an optional `keydir` snapshot for fast startup
//! - Advisory file locking: one writer, or any number of readers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Database                        │
//! │   put / get / delete / list_keys / fold / merge      │
//! └───────┬──────────────────┬──────────────────┬────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!  ┌────────────┐     ┌────────────┐     ┌────────────┐
//!  │  KeyDir    │     │ AppendLog  │     │ Datastore  │
//!  │ (RwLock)   │     │ (segments) │     │ (dir+lock) │
//!  └────────────┘     └─────┬──────┘     └─────┬──────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    ┌────────────┐     ┌────────────┐
//!                    │   record   │     │    sio     │
//!                    │  (codec)   │     │ (safe I/O) │
//!                    └────────────┘     └────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod database;
pub mod dir;
pub mod error;
pub mod keydir;
pub mod log;
pub mod record;
pub mod sio;

pub use config::OpenOption;
pub use database::Database;
pub use dir::TOMBSTONE;
pub use error::{CaskError, CaskResult};
pub use record::KeyDirEntry;

/// Current version of CaskDB.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
