//! Persisted sync state layout.
//!
//! The engine reserves three high store tables:
//!
//! - queue entries, keyed by owner prefix + big-endian sequence (so scan
//!   order is sequence order)
//! - dead letters, same key shape
//! - metadata: the next queue sequence and the pull watermark
//!
//! All keys carry an owner prefix, so several owners can share one store
//! file without seeing each other's state.

use crate::error::SyncResult;
use tally_core::{OwnerId, Timestamp};
use tally_store::{LocalStore, StoreTxn, TableId};

/// Table holding pending queue entries.
pub const QUEUE_TABLE: TableId = TableId::new(0xF0);

/// Table holding quarantined (dead-letter) entries.
pub const DEAD_LETTER_TABLE: TableId = TableId::new(0xF1);

/// Table holding sync metadata.
pub const META_TABLE: TableId = TableId::new(0xF2);

const TAG_NEXT_SEQUENCE: u8 = 1;
const TAG_WATERMARK: u8 = 2;

/// Returns the 8-byte owner prefix used to namespace keys.
pub(crate) fn owner_prefix(owner: OwnerId) -> [u8; 8] {
    let bytes = owner.as_bytes();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&bytes[..8]);
    prefix
}

/// Builds the key for a queue or dead-letter entry.
pub(crate) fn sequence_key(owner: OwnerId, sequence: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&owner_prefix(owner));
    key[8..].copy_from_slice(&sequence.to_be_bytes());
    key
}

/// Builds the key for a metadata entry.
fn meta_key(owner: OwnerId, tag: u8) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&owner_prefix(owner));
    key[15] = tag;
    key
}

fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_le_bytes(arr))
}

/// Accessor for the per-owner metadata entries.
#[derive(Debug, Clone)]
pub(crate) struct SyncMeta {
    owner: OwnerId,
}

impl SyncMeta {
    pub(crate) fn new(owner: OwnerId) -> Self {
        Self { owner }
    }

    /// Loads the next queue sequence, starting at 1 for a fresh store.
    pub(crate) fn next_sequence(&self, store: &LocalStore) -> u64 {
        store
            .get(META_TABLE, meta_key(self.owner, TAG_NEXT_SEQUENCE))
            .as_deref()
            .and_then(decode_u64)
            .unwrap_or(1)
    }

    /// Writes the next queue sequence inside an open transaction.
    ///
    /// Always written in the same commit as the entry it accounts for,
    /// so the counter can never run behind the persisted queue.
    pub(crate) fn put_next_sequence(&self, txn: &mut StoreTxn<'_>, next: u64) {
        txn.put(
            META_TABLE,
            meta_key(self.owner, TAG_NEXT_SEQUENCE),
            next.to_le_bytes().to_vec(),
        );
    }

    /// Loads the pull watermark; zero when no pull ever completed.
    pub(crate) fn watermark(&self, store: &LocalStore) -> Timestamp {
        let micros = store
            .get(META_TABLE, meta_key(self.owner, TAG_WATERMARK))
            .as_deref()
            .and_then(decode_u64)
            .unwrap_or(0);
        Timestamp::from_micros(micros)
    }

    /// Persists the pull watermark.
    pub(crate) fn set_watermark(&self, store: &LocalStore, ts: Timestamp) -> SyncResult<()> {
        store.put(
            META_TABLE,
            meta_key(self.owner, TAG_WATERMARK),
            ts.as_micros().to_le_bytes().to_vec(),
        )?;
        Ok(())
    }
}
