//! The guarded merge primitive.
//!
//! Pull and realtime both funnel remote rows through [`merge_remote_row`]
//! so the two paths cannot diverge. The guards, in order:
//!
//! 1. A pending queue entry for the id wins over any remote state -
//!    local optimistic edits are never clobbered before they are pushed.
//! 2. Last-write-wins by `updated_at`: an equal-or-newer local copy
//!    stands (this also absorbs the self-echo of a just-pushed write).
//! 3. Otherwise the row is applied: upsert for live rows, removal for
//!    tombstones.

use crate::error::{SyncError, SyncResult};
use crate::queue::SyncQueue;
use crate::remote::RemoteRow;
use tally_core::Record;
use tally_store::LocalStore;

/// What merging one remote row did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The row was upserted into the local store.
    Applied,
    /// The tombstone removed the local row (or it was already absent).
    Deleted,
    /// Skipped: a pending local edit for this id wins until pushed.
    SkippedPending,
    /// Skipped: the local copy is as new or newer.
    SkippedStale,
}

/// Merges one remote-origin row into the local store.
pub(crate) fn merge_remote_row(
    store: &LocalStore,
    queue: &SyncQueue,
    row: &RemoteRow,
) -> SyncResult<MergeOutcome> {
    if queue.has_pending_for(row.id)? {
        return Ok(MergeOutcome::SkippedPending);
    }

    let table = row.kind.table();
    let key = row.id.to_key();

    if let Some(bytes) = store.get(table, key) {
        let local = Record::decode(row.kind, &bytes)?;
        if local.updated_at() >= row.updated_at {
            return Ok(MergeOutcome::SkippedStale);
        }
    }

    if row.deleted {
        if store.contains(table, key) {
            store.delete(table, key)?;
        }
        return Ok(MergeOutcome::Deleted);
    }

    let payload = row.payload.as_ref().ok_or_else(|| {
        SyncError::Codec(tally_core::CoreError::decode(
            row.kind.as_str(),
            "live remote row without payload",
        ))
    })?;

    store.put(table, key, payload.clone())?;
    Ok(MergeOutcome::Applied)
}
