//! The owner-scoped synchronizer façade.
//!
//! One [`Synchronizer`] is constructed per authenticated owner and
//! passed to the UI layer by whoever owns the session - there is no
//! global instance. The UI reads through it, writes through it, and
//! decides *when* to trigger push/pull; this engine only guarantees the
//! correctness of each call.

use crate::config::SyncConfig;
use crate::coordinator::{Mutation, MutationCoordinator};
use crate::error::{SyncError, SyncResult};
use crate::merge::MergeOutcome;
use crate::meta::SyncMeta;
use crate::pull::{run_pull, PullOutcome};
use crate::push::{run_push, PushOutcome};
use crate::queue::{DeadLetter, SyncQueue};
use crate::realtime::{apply_event, drain, DrainSummary};
use crate::remote::{RemoteBackend, RemoteEvent};
use parking_lot::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tally_core::{Record, RecordId, RecordKind, Timestamp};
use tally_store::LocalStore;
use tracing::debug;

/// Counters describing the engine's activity so far.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Push cycles that ran (coalesced calls excluded).
    pub push_cycles: u64,
    /// Pull cycles that completed successfully.
    pub pull_cycles: u64,
    /// Queue entries confirmed remotely.
    pub entries_pushed: u64,
    /// Rows merged in by pull cycles.
    pub rows_pulled: u64,
    /// Realtime events merged in.
    pub events_merged: u64,
    /// Entries quarantined to the dead-letter table.
    pub dead_lettered: u64,
    /// Message of the last remote failure, if any.
    pub last_error: Option<String>,
}

/// The local-first synchronization engine for one owner.
///
/// Composes the local store, the sync queue, the mutation coordinator,
/// and the push/pull/realtime paths behind the trigger surface the UI
/// layer consumes: [`mutate`](Self::mutate),
/// [`push_changes`](Self::push_changes),
/// [`pull_changes`](Self::pull_changes), and the read API.
pub struct Synchronizer {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteBackend>,
    config: SyncConfig,
    queue: Arc<SyncQueue>,
    meta: SyncMeta,
    coordinator: MutationCoordinator,
    push_running: AtomicBool,
    stats: RwLock<SyncStats>,
    push_signals: RwLock<Vec<Sender<()>>>,
}

impl Synchronizer {
    /// Creates a synchronizer over the given store and remote backend.
    #[must_use]
    pub fn new(store: Arc<LocalStore>, remote: Arc<dyn RemoteBackend>, config: SyncConfig) -> Self {
        let queue = Arc::new(SyncQueue::open(Arc::clone(&store), config.owner));
        let coordinator = MutationCoordinator::new(Arc::clone(&store), Arc::clone(&queue));
        let meta = SyncMeta::new(config.owner);

        Self {
            store,
            remote,
            config,
            queue,
            meta,
            coordinator,
            push_running: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
            push_signals: RwLock::new(Vec::new()),
        }
    }

    /// Applies a mutation optimistically and signals the push trigger.
    ///
    /// Returns as soon as the local transaction commits; network work is
    /// deferred entirely to push cycles. The returned record carries the
    /// stamped timestamps.
    ///
    /// # Errors
    ///
    /// [`SyncError::Store`] if the local transaction cannot commit (no
    /// partial state exists), [`SyncError::OwnerMismatch`] if the record
    /// belongs to a different owner.
    pub fn mutate(&self, mutation: Mutation) -> SyncResult<Option<Record>> {
        if let Mutation::Create(record) | Mutation::Update(record) = &mutation {
            if record.owner() != self.config.owner {
                return Err(SyncError::OwnerMismatch {
                    expected: self.config.owner,
                    actual: record.owner(),
                });
            }
        }

        let result = self.coordinator.apply(mutation, Timestamp::now())?;

        // Fire-and-forget: whoever services the signal runs the push.
        self.push_signals
            .write()
            .retain(|tx| tx.send(()).is_ok());

        Ok(result)
    }

    /// Subscribes to the push trigger signal.
    ///
    /// The embedding application typically services this on a background
    /// thread that calls [`push_changes`](Self::push_changes); `mutate`
    /// never waits on it.
    #[must_use]
    pub fn subscribe_push_signal(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.push_signals.write().push(tx);
        rx
    }

    /// Runs one push cycle; see [`PushOutcome`].
    ///
    /// Safe to call from any thread at any time: concurrent calls
    /// coalesce onto the in-flight cycle, remote unavailability leaves
    /// the queue untouched for the next trigger.
    ///
    /// # Errors
    ///
    /// Local store or queue failures only; remote unavailability is
    /// reported through [`PushOutcome::stalled`].
    pub fn push_changes(&self) -> SyncResult<PushOutcome> {
        let outcome = run_push(&self.queue, self.remote.as_ref(), &self.push_running)?;

        if !outcome.already_running {
            let mut stats = self.stats.write();
            stats.push_cycles += 1;
            stats.entries_pushed += outcome.pushed;
            stats.dead_lettered += outcome.dead_lettered;
            stats.last_error = outcome
                .stalled
                .then(|| "remote unavailable during push".to_string());
        }

        debug!(
            pushed = outcome.pushed,
            remaining = outcome.remaining,
            stalled = outcome.stalled,
            "push cycle finished"
        );
        Ok(outcome)
    }

    /// Runs push cycles with backoff until the queue stops stalling or
    /// the retry budget is exhausted.
    ///
    /// # Errors
    ///
    /// Same as [`push_changes`](Self::push_changes).
    pub fn push_changes_with_retry(&self) -> SyncResult<PushOutcome> {
        let retry = self.config.retry.clone();
        let mut outcome = self.push_changes()?;

        let mut attempt = 1;
        while outcome.stalled && attempt < retry.max_attempts {
            std::thread::sleep(retry.delay_for_attempt(attempt));
            outcome = self.push_changes()?;
            attempt += 1;
        }

        Ok(outcome)
    }

    /// Runs one pull cycle; see [`PullOutcome`].
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteUnavailable`] on transport failure - the
    /// watermark is left unchanged and the next call re-requests the
    /// same window.
    pub fn pull_changes(&self) -> SyncResult<PullOutcome> {
        let result = run_pull(
            &self.store,
            &self.queue,
            &self.meta,
            self.remote.as_ref(),
            self.config.owner,
            self.config.pull_batch_size,
        );

        let mut stats = self.stats.write();
        match &result {
            Ok(outcome) => {
                stats.pull_cycles += 1;
                stats.rows_pulled += outcome.applied + outcome.deleted;
                stats.last_error = None;
            }
            Err(e) => stats.last_error = Some(e.to_string()),
        }

        result
    }

    /// Subscribes to the remote change stream for this owner.
    #[must_use]
    pub fn subscribe_remote_events(&self) -> Receiver<RemoteEvent> {
        self.remote.subscribe(self.config.owner)
    }

    /// Merges one live change event; see [`MergeOutcome`].
    ///
    /// # Errors
    ///
    /// Local store failures, or a payload that fails to decode.
    pub fn handle_event(&self, event: &RemoteEvent) -> SyncResult<MergeOutcome> {
        let outcome = apply_event(&self.store, &self.queue, event)?;
        if matches!(outcome, MergeOutcome::Applied | MergeOutcome::Deleted) {
            self.stats.write().events_merged += 1;
        }
        Ok(outcome)
    }

    /// Merges every event currently buffered on a receiver.
    ///
    /// # Errors
    ///
    /// Same as [`handle_event`](Self::handle_event).
    pub fn drain_events(&self, receiver: &Receiver<RemoteEvent>) -> SyncResult<DrainSummary> {
        let summary = drain(&self.store, &self.queue, receiver)?;
        self.stats.write().events_merged += summary.applied + summary.deleted;
        Ok(summary)
    }

    /// Reads one record from the local store.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored payload fails to decode.
    pub fn get(&self, kind: RecordKind, id: RecordId) -> SyncResult<Option<Record>> {
        match self.store.get(kind.table(), id.to_key()) {
            Some(bytes) => {
                let record = Record::decode(kind, &bytes)?;
                Ok((record.owner() == self.config.owner).then_some(record))
            }
            None => Ok(None),
        }
    }

    /// Lists all records of a kind, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored payload fails to decode.
    pub fn list(&self, kind: RecordKind) -> SyncResult<Vec<Record>> {
        self.store
            .scan(kind.table())
            .iter()
            .map(|(_, bytes)| Record::decode(kind, bytes).map_err(SyncError::from))
            .filter(|result| match result {
                Ok(record) => record.owner() == self.config.owner,
                Err(_) => true,
            })
            .collect()
    }

    /// Returns the number of pending queue entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    /// Returns the quarantined entries, for out-of-sync surfacing.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted letter fails to decode.
    pub fn dead_letters(&self) -> SyncResult<Vec<DeadLetter>> {
        self.queue.dead_letters()
    }

    /// Returns the persisted pull watermark.
    #[must_use]
    pub fn watermark(&self) -> Timestamp {
        self.meta.watermark(&self.store)
    }

    /// Returns a snapshot of the engine counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the underlying store, for read-only projections.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("owner", &self.config.owner)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use tally_core::{DayStamp, OwnerId, Transaction};

    fn setup() -> (Synchronizer, Arc<MemoryRemote>, OwnerId) {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let owner = OwnerId::new();
        let sync = Synchronizer::new(
            store,
            Arc::clone(&remote) as Arc<dyn RemoteBackend>,
            SyncConfig::new(owner),
        );
        (sync, remote, owner)
    }

    #[test]
    fn mutate_returns_synchronously_and_signals() {
        let (sync, _, owner) = setup();
        let signals = sync.subscribe_push_signal();

        let record = sync
            .mutate(Mutation::create(Transaction::new(
                owner,
                -500,
                DayStamp::from_days(1),
            )))
            .unwrap()
            .unwrap();

        assert_eq!(sync.pending_count(), 1);
        assert!(signals.try_recv().is_ok());

        let read_back = sync.get(RecordKind::Transaction, record.id()).unwrap();
        assert_eq!(read_back, Some(record));
    }

    #[test]
    fn mutate_rejects_foreign_owner() {
        let (sync, _, _) = setup();
        let stranger = OwnerId::new();

        let result = sync.mutate(Mutation::create(Transaction::new(
            stranger,
            -1,
            DayStamp::from_days(1),
        )));

        assert!(matches!(result, Err(SyncError::OwnerMismatch { .. })));
        assert_eq!(sync.pending_count(), 0);
    }

    #[test]
    fn list_returns_owned_records() {
        let (sync, _, owner) = setup();
        sync.mutate(Mutation::create(Transaction::new(
            owner,
            -1,
            DayStamp::from_days(1),
        )))
        .unwrap();
        sync.mutate(Mutation::create(Transaction::new(
            owner,
            -2,
            DayStamp::from_days(2),
        )))
        .unwrap();

        assert_eq!(sync.list(RecordKind::Transaction).unwrap().len(), 2);
        assert!(sync.list(RecordKind::Goal).unwrap().is_empty());
    }

    #[test]
    fn stats_track_cycles() {
        let (sync, _, owner) = setup();
        sync.mutate(Mutation::create(Transaction::new(
            owner,
            -1,
            DayStamp::from_days(1),
        )))
        .unwrap();

        sync.push_changes().unwrap();
        sync.pull_changes().unwrap();

        let stats = sync.stats();
        assert_eq!(stats.push_cycles, 1);
        assert_eq!(stats.entries_pushed, 1);
        assert_eq!(stats.pull_cycles, 1);
        assert!(stats.last_error.is_none());
    }

    #[test]
    fn stalled_push_sets_last_error() {
        let (sync, remote, owner) = setup();
        sync.mutate(Mutation::create(Transaction::new(
            owner,
            -1,
            DayStamp::from_days(1),
        )))
        .unwrap();

        remote.set_online(false);
        let outcome = sync.push_changes().unwrap();
        assert!(outcome.stalled);
        assert!(sync.stats().last_error.is_some());
    }
}
