//! Remote backend abstraction.
//!
//! The remote system-of-record is reachable over a row-oriented CRUD
//! interface plus a change-event stream. This module defines that
//! boundary and provides [`MemoryRemote`], an in-process implementation
//! used by every test (and as the reference for collaborator semantics).

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use tally_core::{OwnerId, Record, RecordId, RecordKind, Timestamp};

/// One row as the remote backend sees it.
///
/// Deleted rows are kept as tombstones: `deleted` is set, the payload is
/// gone, and `updated_at` is bumped to the deletion time. Tombstones stay
/// inside the `updated_at > watermark` pull window, which is what makes
/// pull-based delete propagation correct.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRow {
    /// Kind of the record.
    pub kind: RecordKind,
    /// Record ID (client-generated, stable).
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
    /// True for a soft-deleted row.
    pub deleted: bool,
    /// Record payload; `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

impl RemoteRow {
    /// Builds a live row from a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record payload cannot be encoded.
    pub fn from_record(record: &Record) -> SyncResult<Self> {
        Ok(Self {
            kind: record.kind(),
            id: record.id(),
            owner: record.owner(),
            updated_at: record.updated_at(),
            deleted: false,
            payload: Some(record.encode()?),
        })
    }

    /// Builds a tombstone row.
    #[must_use]
    pub fn tombstone(kind: RecordKind, id: RecordId, owner: OwnerId, deleted_at: Timestamp) -> Self {
        Self {
            kind,
            id,
            owner,
            updated_at: deleted_at,
            deleted: true,
            payload: None,
        }
    }
}

/// The type of a change-stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEventKind {
    /// A row appeared.
    Insert,
    /// A row changed.
    Update,
    /// A row was (soft-)deleted.
    Delete,
}

/// A single change-stream event, scoped to the subscribed owner.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    /// What happened.
    pub event: RemoteEventKind,
    /// The row after the change (a tombstone for deletes).
    pub row: RemoteRow,
}

/// A remote backend handles row CRUD and the change stream.
///
/// # Idempotence contract
///
/// A push can succeed remotely and still be retried (crash before the
/// local dequeue), so every method here must be safe to re-apply:
/// `insert` and `update` are upserts keyed by id under last-write-wins,
/// and `delete` writes a tombstone that is unaffected by repetition.
pub trait RemoteBackend: Send + Sync {
    /// Inserts a row. MUST behave as an upsert by id.
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteUnavailable`] on transport failure,
    /// [`SyncError::RemoteRejected`] on permanent rejection.
    fn insert(&self, row: &RemoteRow) -> SyncResult<()>;

    /// Updates a row keyed by id. MUST behave as an upsert by id.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`RemoteBackend::insert`].
    fn update(&self, row: &RemoteRow) -> SyncResult<()>;

    /// Soft-deletes a row, writing a tombstone stamped `deleted_at`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`RemoteBackend::insert`].
    fn delete(
        &self,
        kind: RecordKind,
        id: RecordId,
        owner: OwnerId,
        deleted_at: Timestamp,
    ) -> SyncResult<()>;

    /// Returns rows of one kind with `updated_at > after`, tombstones
    /// included, up to `limit`.
    ///
    /// Rows MUST be ordered by ascending `updated_at` (ties broken by
    /// id), so a truncated result is a time-prefix of the window and the
    /// pull path can paginate with a timestamp cursor.
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteUnavailable`] on transport failure.
    fn select_since(
        &self,
        kind: RecordKind,
        owner: OwnerId,
        after: Timestamp,
        limit: u32,
    ) -> SyncResult<Vec<RemoteRow>>;

    /// Subscribes to the change stream for one owner.
    ///
    /// Events for rows of other owners are never delivered.
    fn subscribe(&self, owner: OwnerId) -> Receiver<RemoteEvent>;
}

/// A call observed by [`MemoryRemote`], for order assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// An insert of the given record.
    Insert(RecordKind, RecordId),
    /// An update of the given record.
    Update(RecordKind, RecordId),
    /// A delete of the given record.
    Delete(RecordKind, RecordId),
}

/// An in-process remote backend.
///
/// Applies last-write-wins by `updated_at` (the system-of-record policy),
/// keeps tombstones, broadcasts change events to per-owner subscribers,
/// and supports fault injection:
///
/// - [`MemoryRemote::set_online`] makes every call fail with
///   [`SyncError::RemoteUnavailable`]
/// - [`MemoryRemote::reject_next`] makes the next mutating call fail with
///   [`SyncError::RemoteRejected`]
#[derive(Default)]
pub struct MemoryRemote {
    rows: RwLock<BTreeMap<(u8, RecordId), RemoteRow>>,
    subscribers: RwLock<Vec<(OwnerId, Sender<RemoteEvent>)>>,
    offline: AtomicBool,
    reject_next: Mutex<Option<String>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl MemoryRemote {
    /// Creates an empty remote backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the backend is reachable.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Makes the next mutating call fail permanently with the reason.
    pub fn reject_next(&self, reason: impl Into<String>) {
        *self.reject_next.lock() = Some(reason.into());
    }

    /// Returns the row for a record, tombstones included.
    #[must_use]
    pub fn row(&self, kind: RecordKind, id: RecordId) -> Option<RemoteRow> {
        self.rows.read().get(&(kind.code(), id)).cloned()
    }

    /// Returns every mutating call seen so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Preloads a row without emitting an event, as if another client had
    /// pushed it before we subscribed.
    pub fn seed(&self, row: RemoteRow) {
        self.rows.write().insert((row.kind.code(), row.id), row);
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::unavailable("remote offline"));
        }
        Ok(())
    }

    fn check_accepted(&self, kind: RecordKind, id: RecordId) -> SyncResult<()> {
        if let Some(reason) = self.reject_next.lock().take() {
            return Err(SyncError::rejected(kind, id, reason));
        }
        Ok(())
    }

    /// Applies a row under last-write-wins and broadcasts the event.
    fn apply(&self, row: RemoteRow) {
        let key = (row.kind.code(), row.id);
        let mut rows = self.rows.write();

        let event = match rows.get(&key) {
            Some(existing) if existing.updated_at > row.updated_at => {
                // Stale write loses; the stored row stands.
                return;
            }
            Some(_) if row.deleted => RemoteEventKind::Delete,
            Some(_) => RemoteEventKind::Update,
            None if row.deleted => RemoteEventKind::Delete,
            None => RemoteEventKind::Insert,
        };

        rows.insert(key, row.clone());
        drop(rows);

        self.broadcast(RemoteEvent { event, row });
    }

    fn broadcast(&self, event: RemoteEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|(owner, tx)| {
            *owner != event.row.owner || tx.send(event.clone()).is_ok()
        });
    }
}

impl RemoteBackend for MemoryRemote {
    fn insert(&self, row: &RemoteRow) -> SyncResult<()> {
        self.check_reachable()?;
        self.check_accepted(row.kind, row.id)?;
        self.calls.lock().push(RemoteCall::Insert(row.kind, row.id));
        self.apply(row.clone());
        Ok(())
    }

    fn update(&self, row: &RemoteRow) -> SyncResult<()> {
        self.check_reachable()?;
        self.check_accepted(row.kind, row.id)?;
        self.calls.lock().push(RemoteCall::Update(row.kind, row.id));
        self.apply(row.clone());
        Ok(())
    }

    fn delete(
        &self,
        kind: RecordKind,
        id: RecordId,
        owner: OwnerId,
        deleted_at: Timestamp,
    ) -> SyncResult<()> {
        self.check_reachable()?;
        self.check_accepted(kind, id)?;
        self.calls.lock().push(RemoteCall::Delete(kind, id));
        self.apply(RemoteRow::tombstone(kind, id, owner, deleted_at));
        Ok(())
    }

    fn select_since(
        &self,
        kind: RecordKind,
        owner: OwnerId,
        after: Timestamp,
        limit: u32,
    ) -> SyncResult<Vec<RemoteRow>> {
        self.check_reachable()?;

        let rows = self.rows.read();
        let mut matched: Vec<RemoteRow> = rows
            .range((kind.code(), RecordId::from_bytes([0; 16]))..=(kind.code(), RecordId::from_bytes([0xFF; 16])))
            .map(|(_, row)| row)
            .filter(|row| row.owner == owner && row.updated_at > after)
            .cloned()
            .collect();
        matched.sort_by_key(|row| (row.updated_at, row.id));
        matched.truncate(limit as usize);
        Ok(matched)
    }

    fn subscribe(&self, owner: OwnerId) -> Receiver<RemoteEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push((owner, tx));
        rx
    }
}

impl std::fmt::Debug for MemoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRemote")
            .field("rows", &self.rows.read().len())
            .finish_non_exhaustive()
    }
}
