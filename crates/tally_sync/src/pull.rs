//! The pull synchronizer.
//!
//! Fetches remote rows changed since the persisted watermark and merges
//! them through the guarded merge primitive. The watermark advances only
//! after every tracked kind pulled without error; a partial failure
//! leaves it unchanged so the next pull re-requests the same window
//! (safe, because the merge is an idempotent guarded upsert).

use crate::error::SyncResult;
use crate::merge::{merge_remote_row, MergeOutcome};
use crate::meta::SyncMeta;
use crate::queue::SyncQueue;
use crate::remote::RemoteBackend;
use tally_core::{OwnerId, RecordKind, Timestamp};
use tally_store::LocalStore;
use tracing::{debug, warn};

/// What one pull cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullOutcome {
    /// Rows upserted into the local store.
    pub applied: u64,
    /// Tombstones that removed local rows.
    pub deleted: u64,
    /// Rows skipped because a local edit is pending for the id.
    pub skipped_pending: u64,
    /// Rows skipped because the local copy was as new or newer.
    pub skipped_stale: u64,
    /// The watermark after the cycle.
    pub watermark: Timestamp,
}

/// Runs one pull cycle over every record kind.
pub(crate) fn run_pull(
    store: &LocalStore,
    queue: &SyncQueue,
    meta: &SyncMeta,
    remote: &dyn RemoteBackend,
    owner: OwnerId,
    batch_size: u32,
) -> SyncResult<PullOutcome> {
    let since = meta.watermark(store);
    let mut max_seen = since;
    let mut outcome = PullOutcome::default();

    for kind in RecordKind::ALL {
        // Paginate within the kind; the persisted watermark is untouched
        // until the whole cycle succeeds.
        let mut cursor = since;
        loop {
            let rows = remote.select_since(kind, owner, cursor, batch_size)?;
            let page_len = rows.len();
            let mut page_max = cursor;

            for row in &rows {
                page_max = page_max.max(row.updated_at);
                max_seen = max_seen.max(row.updated_at);

                match merge_remote_row(store, queue, row)? {
                    MergeOutcome::Applied => outcome.applied += 1,
                    MergeOutcome::Deleted => outcome.deleted += 1,
                    MergeOutcome::SkippedPending => outcome.skipped_pending += 1,
                    MergeOutcome::SkippedStale => outcome.skipped_stale += 1,
                }
            }

            if page_len < batch_size as usize {
                break;
            }

            // A full page may cut a run of equal timestamps in half. The
            // cursor moves to the greatest timestamp strictly below the
            // page maximum, so the tied tail is re-fetched next page; the
            // guarded merge makes the re-merge a no-op.
            match rows
                .iter()
                .map(|row| row.updated_at)
                .filter(|ts| *ts < page_max)
                .max()
            {
                Some(below_max) => cursor = below_max,
                None => {
                    // Every row of a full page shares one microsecond.
                    // A timestamp cursor cannot advance through this;
                    // it needs a batch size above the tie width.
                    warn!(
                        kind = %kind,
                        batch_size,
                        "pull page is a single-timestamp tie, stopping this kind"
                    );
                    break;
                }
            }
        }
    }

    if max_seen > since {
        meta.set_watermark(store, max_seen)?;
    }
    outcome.watermark = max_seen;

    debug!(
        applied = outcome.applied,
        deleted = outcome.deleted,
        skipped_pending = outcome.skipped_pending,
        skipped_stale = outcome.skipped_stale,
        watermark = %outcome.watermark,
        "pull cycle complete"
    );

    Ok(outcome)
}
