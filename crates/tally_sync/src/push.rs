//! The push synchronizer.
//!
//! Drains the sync queue against the remote backend, one entry at a
//! time, strictly in ascending sequence order. An entry is removed only
//! on confirmed success. The cycle is single-flight: a concurrent call
//! coalesces into a no-op while one is running.

use crate::error::{SyncError, SyncResult};
use crate::queue::{QueueAction, QueueEntry, SyncQueue};
use crate::remote::{RemoteBackend, RemoteRow};
use std::sync::atomic::{AtomicBool, Ordering};
use tally_core::{Record, Timestamp};
use tracing::{debug, warn};

/// What one push cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOutcome {
    /// Entries confirmed and removed from the queue.
    pub pushed: u64,
    /// Entries quarantined to the dead-letter table.
    pub dead_lettered: u64,
    /// Entries still pending after the cycle.
    pub remaining: usize,
    /// True if the cycle stopped early because the remote was
    /// unreachable; the stalled entry and everything behind it stay
    /// queued for the next trigger.
    pub stalled: bool,
    /// True if another cycle was already in flight and this call
    /// coalesced into a no-op.
    pub already_running: bool,
}

impl PushOutcome {
    fn coalesced() -> Self {
        Self {
            already_running: true,
            ..Self::default()
        }
    }
}

/// Resets the single-flight flag when the cycle ends, on every path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs one push cycle.
///
/// Entries enqueued while the cycle runs are left for the next trigger;
/// they are never lost and never reordered ahead of older entries.
pub(crate) fn run_push(
    queue: &SyncQueue,
    remote: &dyn RemoteBackend,
    running: &AtomicBool,
) -> SyncResult<PushOutcome> {
    if running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(PushOutcome::coalesced());
    }
    let _guard = FlightGuard(running);

    let entries = queue.pending()?;
    let mut outcome = PushOutcome::default();

    for entry in &entries {
        match push_entry(remote, entry) {
            Ok(()) => {
                queue.remove(entry.sequence)?;
                outcome.pushed += 1;
                debug!(
                    sequence = entry.sequence,
                    kind = %entry.kind,
                    "queue entry confirmed"
                );
            }
            Err(SyncError::RemoteUnavailable { message }) => {
                // Later entries may causally depend on this one; never
                // skip ahead past it.
                debug!(
                    sequence = entry.sequence,
                    message = %message,
                    "push stalled, will retry on next trigger"
                );
                outcome.stalled = true;
                break;
            }
            Err(SyncError::RemoteRejected { reason, .. }) => {
                warn!(
                    sequence = entry.sequence,
                    kind = %entry.kind,
                    reason = %reason,
                    "entry rejected permanently, quarantining"
                );
                queue.quarantine(entry, reason, Timestamp::now())?;
                outcome.dead_lettered += 1;
                break;
            }
            Err(other) => return Err(other),
        }
    }

    outcome.remaining = queue.pending_count();
    Ok(outcome)
}

/// Replays one entry against the remote backend.
///
/// Re-application after a lost acknowledgement is safe: Create/Update are
/// upserts by id and Delete writes an idempotent tombstone.
fn push_entry(remote: &dyn RemoteBackend, entry: &QueueEntry) -> SyncResult<()> {
    match entry.action {
        QueueAction::Create => remote.insert(&row_from_entry(entry)?),
        QueueAction::Update => remote.update(&row_from_entry(entry)?),
        QueueAction::Delete => {
            remote.delete(entry.kind, entry.record_id, entry.owner, entry.enqueued_at)
        }
    }
}

fn row_from_entry(entry: &QueueEntry) -> SyncResult<RemoteRow> {
    let payload = entry.payload.as_ref().ok_or(SyncError::QueueCorrupt {
        sequence: entry.sequence,
        message: "entry without payload".into(),
    })?;
    let record = Record::decode(entry.kind, payload)?;
    RemoteRow::from_record(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteCall};
    use std::sync::Arc;
    use tally_core::{DayStamp, OwnerId, RecordKind, Transaction};
    use tally_store::LocalStore;

    struct Fixture {
        store: Arc<LocalStore>,
        queue: SyncQueue,
        remote: MemoryRemote,
        running: AtomicBool,
        owner: OwnerId,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(LocalStore::open_in_memory().unwrap());
            let owner = OwnerId::new();
            Self {
                queue: SyncQueue::open(Arc::clone(&store), owner),
                store,
                remote: MemoryRemote::new(),
                running: AtomicBool::new(false),
                owner,
            }
        }

        fn enqueue_create(&self, micros: u64) -> Record {
            let mut record =
                Record::from(Transaction::new(self.owner, -100, DayStamp::from_days(1)));
            record.stamp_created(Timestamp::from_micros(micros));
            let payload = record.encode().unwrap();

            self.store
                .transaction(|txn| {
                    self.queue.append_in_txn(
                        txn,
                        record.kind(),
                        QueueAction::Create,
                        record.id(),
                        Some(payload.clone()),
                        Timestamp::from_micros(micros),
                    )?;
                    Ok(())
                })
                .unwrap();
            record
        }

        fn push(&self) -> PushOutcome {
            run_push(&self.queue, &self.remote, &self.running).unwrap()
        }
    }

    #[test]
    fn drains_queue_in_sequence_order() {
        let f = Fixture::new();
        let a = f.enqueue_create(10);
        let b = f.enqueue_create(20);

        let outcome = f.push();
        assert_eq!(outcome.pushed, 2);
        assert_eq!(outcome.remaining, 0);
        assert!(!outcome.stalled);

        assert_eq!(
            f.remote.calls(),
            vec![
                RemoteCall::Insert(RecordKind::Transaction, a.id()),
                RemoteCall::Insert(RecordKind::Transaction, b.id()),
            ]
        );
    }

    #[test]
    fn failure_stops_the_cycle_and_keeps_entries() {
        let f = Fixture::new();
        f.enqueue_create(10);
        f.enqueue_create(20);

        f.remote.set_online(false);
        let outcome = f.push();

        assert_eq!(outcome.pushed, 0);
        assert_eq!(outcome.remaining, 2);
        assert!(outcome.stalled);

        // Next trigger drains from the same entry
        f.remote.set_online(true);
        let outcome = f.push();
        assert_eq!(outcome.pushed, 2);
        assert_eq!(outcome.remaining, 0);
    }

    #[test]
    fn reapplying_a_confirmed_entry_is_idempotent() {
        // Simulates a crash between remote success and local dequeue:
        // the same entry is pushed twice.
        let f = Fixture::new();
        let record = f.enqueue_create(10);

        let entry = f.queue.pending().unwrap().remove(0);
        push_entry(&f.remote, &entry).unwrap();
        push_entry(&f.remote, &entry).unwrap();

        let row = f.remote.row(RecordKind::Transaction, record.id()).unwrap();
        assert_eq!(row.updated_at, Timestamp::from_micros(10));
        assert!(!row.deleted);
    }

    #[test]
    fn rejection_quarantines_and_stops() {
        let f = Fixture::new();
        let bad = f.enqueue_create(10);
        f.enqueue_create(20);

        f.remote.reject_next("check constraint failed");
        let outcome = f.push();

        assert_eq!(outcome.pushed, 0);
        assert_eq!(outcome.dead_lettered, 1);
        assert_eq!(outcome.remaining, 1);

        let letters = f.queue.dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].entry.record_id, bad.id());
        assert_eq!(letters[0].reason, "check constraint failed");

        // The next cycle proceeds past the quarantined entry
        let outcome = f.push();
        assert_eq!(outcome.pushed, 1);
        assert_eq!(outcome.remaining, 0);
    }

    #[test]
    fn concurrent_call_coalesces() {
        let f = Fixture::new();
        f.enqueue_create(10);

        f.running.store(true, Ordering::SeqCst);
        let outcome = f.push();
        assert!(outcome.already_running);
        assert_eq!(outcome.pushed, 0);

        f.running.store(false, Ordering::SeqCst);
        let outcome = f.push();
        assert_eq!(outcome.pushed, 1);
    }

    #[test]
    fn flight_flag_resets_after_errors() {
        let f = Fixture::new();
        f.enqueue_create(10);

        f.remote.set_online(false);
        let _ = f.push();
        assert!(!f.running.load(Ordering::SeqCst));
    }

    #[test]
    fn delete_entries_push_tombstones() {
        let f = Fixture::new();
        let record = f.enqueue_create(10);
        f.push();

        f.store
            .transaction(|txn| {
                f.queue.append_in_txn(
                    txn,
                    RecordKind::Transaction,
                    QueueAction::Delete,
                    record.id(),
                    None,
                    Timestamp::from_micros(30),
                )?;
                Ok(())
            })
            .unwrap();

        let outcome = f.push();
        assert_eq!(outcome.pushed, 1);

        let row = f.remote.row(RecordKind::Transaction, record.id()).unwrap();
        assert!(row.deleted);
        assert_eq!(row.updated_at, Timestamp::from_micros(30));
    }
}
