//! The optimistic write path.
//!
//! Every local mutation goes through here: the record write and its
//! queue entry are committed in one atomic store transaction, then the
//! call returns without touching the network. The push synchronizer is
//! signalled separately (fire-and-forget) by the engine façade.

use crate::error::SyncResult;
use crate::queue::{QueueAction, SyncQueue};
use parking_lot::Mutex;
use std::sync::Arc;
use tally_core::{Record, RecordId, RecordKind, Timestamp};
use tally_store::LocalStore;

/// A mutation requested by the application.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a record. The id is client-generated (already on the
    /// record); timestamps are stamped by the coordinator.
    Create(Record),
    /// Update a record in place; `updated_at` is bumped by the
    /// coordinator.
    Update(Record),
    /// Delete a record by id.
    Delete {
        /// Kind of the record.
        kind: RecordKind,
        /// ID of the record.
        id: RecordId,
    },
}

impl Mutation {
    /// Creates a Create mutation.
    pub fn create(record: impl Into<Record>) -> Self {
        Self::Create(record.into())
    }

    /// Creates an Update mutation.
    pub fn update(record: impl Into<Record>) -> Self {
        Self::Update(record.into())
    }

    /// Creates a Delete mutation.
    #[must_use]
    pub fn delete(kind: RecordKind, id: RecordId) -> Self {
        Self::Delete { kind, id }
    }

    /// Returns the kind of the affected record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Create(r) | Self::Update(r) => r.kind(),
            Self::Delete { kind, .. } => *kind,
        }
    }

    /// Returns the id of the affected record.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Create(r) | Self::Update(r) => r.id(),
            Self::Delete { id, .. } => *id,
        }
    }
}

/// Applies mutations to the local store and the sync queue.
pub(crate) struct MutationCoordinator {
    store: Arc<LocalStore>,
    queue: Arc<SyncQueue>,
    // Serializes writers so queue sequences commit in assignment order.
    write_lock: Mutex<()>,
}

impl MutationCoordinator {
    pub(crate) fn new(store: Arc<LocalStore>, queue: Arc<SyncQueue>) -> Self {
        Self {
            store,
            queue,
            write_lock: Mutex::new(()),
        }
    }

    /// Applies a mutation optimistically.
    ///
    /// Returns the stored record for Create/Update and `None` for
    /// Delete. On error nothing is applied: the record write and the
    /// queue entry share one store transaction.
    pub(crate) fn apply(&self, mutation: Mutation, now: Timestamp) -> SyncResult<Option<Record>> {
        let _guard = self.write_lock.lock();

        match mutation {
            Mutation::Create(mut record) => {
                record.stamp_created(now);
                self.write_record(&record, QueueAction::Create, now)?;
                Ok(Some(record))
            }
            Mutation::Update(mut record) => {
                record.touch(now);
                self.write_record(&record, QueueAction::Update, now)?;
                Ok(Some(record))
            }
            Mutation::Delete { kind, id } => {
                self.store.transaction(|txn| {
                    txn.delete(kind.table(), id.to_key());
                    self.queue
                        .append_in_txn(txn, kind, QueueAction::Delete, id, None, now)?;
                    Ok(())
                })?;
                Ok(None)
            }
        }
    }

    fn write_record(&self, record: &Record, action: QueueAction, now: Timestamp) -> SyncResult<()> {
        let payload = record.encode()?;
        let kind = record.kind();
        let id = record.id();

        self.store.transaction(|txn| {
            txn.put(kind.table(), id.to_key(), payload.clone());
            self.queue
                .append_in_txn(txn, kind, action, id, Some(payload.clone()), now)?;
            Ok(())
        })?;
        Ok(())
    }
}
