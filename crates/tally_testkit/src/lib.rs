//! # Tally Testkit
//!
//! Shared test utilities for the Tally sync workspace:
//!
//! - [`fixtures`]: stores with cleanup, sample records, and the wired
//!   [`fixtures::SyncHarness`] for end-to-end scenarios
//! - [`generators`]: proptest strategies for records and mutation
//!   scripts
//!
//! This crate is a dev-dependency of the other workspace members; it
//! never ships in the application.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::{SyncHarness, TestStore};
