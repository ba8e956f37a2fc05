//! # Tally Sync
//!
//! The local-first synchronization engine for Tally.
//!
//! This crate provides:
//! - [`Mutation`]/[`Synchronizer::mutate`]: the optimistic write path
//!   (record + queue entry in one atomic local transaction)
//! - [`SyncQueue`]: the persisted, strictly ordered log of pending
//!   mutations, with a dead-letter table for permanent rejections
//! - [`Synchronizer::push_changes`]: single-flight queue drain in
//!   sequence order with stop-on-failure
//! - [`Synchronizer::pull_changes`]: watermark-windowed pull with
//!   all-or-nothing watermark advance
//! - [`Synchronizer::handle_event`]: realtime merge sharing the pull
//!   path's guarded upsert
//! - [`RemoteBackend`]: the row CRUD + change stream boundary, with the
//!   in-process [`MemoryRemote`] for tests
//!
//! ## Architecture
//!
//! The UI reads and writes only the local store, never the remote
//! backend. A mutation commits locally and returns; push cycles drain
//! the queue in the background; pull and realtime merge remote-origin
//! changes back in through one shared guarded-upsert primitive.
//!
//! ## Key Invariants
//!
//! - A record write and its queue entry are inseparable (one commit)
//! - Queue entries are applied remotely in ascending sequence order and
//!   never skipped past a failure
//! - Re-applying a confirmed entry is safe (upserts + tombstones)
//! - A pending local edit is never clobbered by remote data
//! - The watermark advances only after a fully successful pull

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod engine;
mod error;
mod merge;
mod meta;
mod pull;
mod push;
mod queue;
mod realtime;
mod remote;

pub use config::{RetryConfig, SyncConfig};
pub use coordinator::Mutation;
pub use engine::{SyncStats, Synchronizer};
pub use error::{SyncError, SyncResult};
pub use merge::MergeOutcome;
pub use meta::{DEAD_LETTER_TABLE, META_TABLE, QUEUE_TABLE};
pub use pull::PullOutcome;
pub use push::PushOutcome;
pub use queue::{DeadLetter, QueueAction, QueueEntry, SyncQueue};
pub use realtime::DrainSummary;
pub use remote::{MemoryRemote, RemoteBackend, RemoteCall, RemoteEvent, RemoteEventKind, RemoteRow};
