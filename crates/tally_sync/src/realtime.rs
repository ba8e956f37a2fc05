//! The realtime merge handler.
//!
//! Consumes live change events from the remote backend's stream and
//! applies them through the same guarded merge primitive as the pull
//! path. A self-echo of a just-pushed write is absorbed by the
//! last-write-wins guard; a pending local edit always wins until pushed.

use crate::error::SyncResult;
use crate::merge::{merge_remote_row, MergeOutcome};
use crate::queue::SyncQueue;
use crate::remote::RemoteEvent;
use std::sync::mpsc::Receiver;
use tally_store::LocalStore;
use tracing::debug;

/// Counts from draining a batch of buffered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainSummary {
    /// Events taken from the stream.
    pub events: u64,
    /// Rows upserted locally.
    pub applied: u64,
    /// Local rows removed by tombstones.
    pub deleted: u64,
    /// Events skipped by the pending or staleness guards.
    pub skipped: u64,
}

/// Applies one change event to the local store.
pub(crate) fn apply_event(
    store: &LocalStore,
    queue: &SyncQueue,
    event: &RemoteEvent,
) -> SyncResult<MergeOutcome> {
    let outcome = merge_remote_row(store, queue, &event.row)?;
    debug!(
        event = ?event.event,
        kind = %event.row.kind,
        id = %event.row.id,
        outcome = ?outcome,
        "realtime event merged"
    );
    Ok(outcome)
}

/// Applies every event currently buffered on the receiver.
pub(crate) fn drain(
    store: &LocalStore,
    queue: &SyncQueue,
    receiver: &Receiver<RemoteEvent>,
) -> SyncResult<DrainSummary> {
    let mut summary = DrainSummary::default();

    for event in receiver.try_iter() {
        summary.events += 1;
        match apply_event(store, queue, &event)? {
            MergeOutcome::Applied => summary.applied += 1,
            MergeOutcome::Deleted => summary.deleted += 1,
            MergeOutcome::SkippedPending | MergeOutcome::SkippedStale => summary.skipped += 1,
        }
    }

    Ok(summary)
}
