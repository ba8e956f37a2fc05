//! The persisted sync queue.
//!
//! An append-only, strictly ordered log of pending mutations destined for
//! the remote backend. Entries live in a reserved store table so they
//! commit atomically with the record writes they describe, and survive
//! restarts. Entries are never mutated after creation; they are removed
//! by the push synchronizer on confirmed success, or quarantined to the
//! dead-letter table on permanent rejection.

use crate::error::{SyncError, SyncResult};
use crate::meta::{owner_prefix, sequence_key, SyncMeta, DEAD_LETTER_TABLE, QUEUE_TABLE};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_core::{OwnerId, RecordId, RecordKind, Timestamp};
use tally_store::{LocalStore, StoreTxn};

/// The action a queue entry replays against the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueAction {
    /// Insert the payload remotely (as an upsert by id).
    Create,
    /// Update the payload remotely, keyed by id.
    Update,
    /// Soft-delete the record remotely.
    Delete,
}

/// A single pending mutation.
///
/// `payload` is the full record snapshot for Create/Update and `None`
/// for Delete. The entry is immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Monotonic per-owner sequence; push order.
    pub sequence: u64,
    /// Kind of the affected record.
    pub kind: RecordKind,
    /// What to replay remotely.
    pub action: QueueAction,
    /// ID of the affected record.
    pub record_id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Record snapshot for Create/Update; `None` for Delete.
    pub payload: Option<Vec<u8>>,
    /// When the mutation was enqueued.
    pub enqueued_at: Timestamp,
}

/// A permanently rejected entry, moved out of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The quarantined entry.
    pub entry: QueueEntry,
    /// The remote backend's rejection reason.
    pub reason: String,
    /// When the entry was quarantined.
    pub quarantined_at: Timestamp,
}

/// The persisted sync queue for one owner.
pub struct SyncQueue {
    store: Arc<LocalStore>,
    owner: OwnerId,
    meta: SyncMeta,
    next_sequence: Mutex<u64>,
}

impl SyncQueue {
    /// Opens the queue, restoring the sequence counter from the store.
    #[must_use]
    pub fn open(store: Arc<LocalStore>, owner: OwnerId) -> Self {
        let meta = SyncMeta::new(owner);
        let next_sequence = Mutex::new(meta.next_sequence(&store));
        Self {
            store,
            owner,
            meta,
            next_sequence,
        }
    }

    /// Appends an entry inside an open store transaction.
    ///
    /// The entry and the advanced sequence counter land in the same
    /// commit as the caller's record write, so a crash can never separate
    /// a local mutation from its queue entry.
    ///
    /// Returns a [`tally_store::StoreResult`] so it composes with the
    /// surrounding [`LocalStore::transaction`] closure.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded.
    pub fn append_in_txn(
        &self,
        txn: &mut StoreTxn<'_>,
        kind: RecordKind,
        action: QueueAction,
        record_id: RecordId,
        payload: Option<Vec<u8>>,
        now: Timestamp,
    ) -> tally_store::StoreResult<QueueEntry> {
        let sequence = {
            let mut next = self.next_sequence.lock();
            let sequence = *next;
            *next += 1;
            sequence
        };

        let entry = QueueEntry {
            sequence,
            kind,
            action,
            record_id,
            owner: self.owner,
            payload,
            enqueued_at: now,
        };

        let bytes = encode(&entry).map_err(|e| tally_store::StoreError::Codec(e.to_string()))?;
        txn.put(QUEUE_TABLE, sequence_key(self.owner, sequence), bytes);
        self.meta.put_next_sequence(txn, sequence + 1);

        Ok(entry)
    }

    /// Returns all pending entries in ascending sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::QueueCorrupt`] if a persisted entry fails to
    /// decode.
    pub fn pending(&self) -> SyncResult<Vec<QueueEntry>> {
        self.scan_entries(QUEUE_TABLE)
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let prefix = owner_prefix(self.owner);
        self.store
            .scan(QUEUE_TABLE)
            .iter()
            .filter(|(key, _)| key[..8] == prefix)
            .count()
    }

    /// Returns true if any pending entry targets the given record.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted entry fails to decode.
    pub fn has_pending_for(&self, id: RecordId) -> SyncResult<bool> {
        Ok(self.pending()?.iter().any(|e| e.record_id == id))
    }

    /// Removes a confirmed entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot commit the removal.
    pub fn remove(&self, sequence: u64) -> SyncResult<()> {
        self.store
            .delete(QUEUE_TABLE, sequence_key(self.owner, sequence))?;
        Ok(())
    }

    /// Moves an entry to the dead-letter table with the rejection reason.
    ///
    /// The removal and the dead-letter write are one atomic commit.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the commit fails.
    pub fn quarantine(
        &self,
        entry: &QueueEntry,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> SyncResult<()> {
        let letter = DeadLetter {
            entry: entry.clone(),
            reason: reason.into(),
            quarantined_at: now,
        };
        let bytes = encode(&letter)?;
        let key = sequence_key(self.owner, entry.sequence);

        self.store.transaction(|txn| {
            txn.delete(QUEUE_TABLE, key);
            txn.put(DEAD_LETTER_TABLE, key, bytes.clone());
            Ok(())
        })?;
        Ok(())
    }

    /// Returns all quarantined entries in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::QueueCorrupt`] if a letter fails to decode.
    pub fn dead_letters(&self) -> SyncResult<Vec<DeadLetter>> {
        let prefix = owner_prefix(self.owner);
        self.store
            .scan(DEAD_LETTER_TABLE)
            .iter()
            .filter(|(key, _)| key[..8] == prefix)
            .map(|(key, value)| decode(sequence_from_key(key), value))
            .collect()
    }

    fn scan_entries(&self, table: tally_store::TableId) -> SyncResult<Vec<QueueEntry>> {
        let prefix = owner_prefix(self.owner);
        self.store
            .scan(table)
            .iter()
            .filter(|(key, _)| key[..8] == prefix)
            .map(|(key, value)| decode(sequence_from_key(key), value))
            .collect()
    }
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("owner", &self.owner)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

fn sequence_from_key(key: &[u8; 16]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[8..]);
    u64::from_be_bytes(bytes)
}

fn encode<T: Serialize>(value: &T) -> SyncResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| SyncError::QueueCorrupt {
        sequence: 0,
        message: format!("encode failure: {e}"),
    })?;
    Ok(buf)
}

fn decode<T: serde::de::DeserializeOwned>(sequence: u64, bytes: &[u8]) -> SyncResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| SyncError::QueueCorrupt {
        sequence,
        message: e.to_string(),
    })
}
