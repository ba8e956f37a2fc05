//! # Tally Store
//!
//! Durable, table-oriented key-value storage for the Tally sync core.
//!
//! This crate provides:
//! - A storage backend trait with in-memory and file implementations
//! - A framed, checksummed commit log
//! - [`LocalStore`]: logical tables with atomic multi-table transactions
//!
//! ## Key Invariants
//!
//! - A committed batch is applied in full or not at all
//! - Replay after a crash reconstructs exactly the committed prefix
//! - A torn frame at the log tail is discarded, never misread
//! - One process owns a store file at a time (advisory lock)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod log;
mod memory;
mod store;
mod table;

pub use backend::StorageBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use log::{compute_crc32, encode_frame, replay, LogCommit, LogOp, Replay, LOG_MAGIC, LOG_VERSION};
pub use memory::InMemoryBackend;
pub use store::{LocalStore, StoreTxn};
pub use table::TableId;
