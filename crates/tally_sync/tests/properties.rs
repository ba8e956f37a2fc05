//! Property tests over arbitrary mutation interleavings.

use proptest::prelude::*;
use std::sync::Arc;
use tally_core::{Record, RecordId, RecordKind};
use tally_sync::{Mutation, SyncQueue};
use tally_testkit::generators::{mutation_script_strategy, MutationStep};
use tally_testkit::SyncHarness;

/// Replays a script against a harness, returning the ids it touched.
fn run_script(harness: &SyncHarness, script: &[MutationStep]) -> Vec<RecordId> {
    let mut created: Vec<Record> = Vec::new();

    for step in script {
        match step {
            MutationStep::Create { amount_minor } => {
                let record = harness.create_transaction(*amount_minor);
                created.push(record);
            }
            MutationStep::Update {
                index,
                amount_minor,
            } => {
                if created.is_empty() {
                    continue;
                }
                let target = &created[index % created.len()];
                let Record::Transaction(mut txn) = target.clone() else {
                    unreachable!("scripts only create transactions");
                };
                txn.amount_minor = *amount_minor;
                let updated = harness
                    .sync
                    .mutate(Mutation::update(txn))
                    .unwrap()
                    .unwrap();
                let slot = index % created.len();
                created[slot] = updated;
            }
            MutationStep::Delete { index } => {
                if created.is_empty() {
                    continue;
                }
                let target = created[index % created.len()].id();
                harness
                    .sync
                    .mutate(Mutation::delete(RecordKind::Transaction, target))
                    .unwrap();
            }
        }
    }

    created.iter().map(Record::id).collect()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    /// Queue sequences are strictly increasing in scan order, whatever
    /// the interleaving of creates, updates, and deletes.
    #[test]
    fn queue_sequences_are_strictly_increasing(script in mutation_script_strategy(1, 25)) {
        let harness = SyncHarness::new();
        run_script(&harness, &script);

        let queue = SyncQueue::open(Arc::clone(&harness.store), harness.owner);
        let pending = queue.pending().unwrap();

        for window in pending.windows(2) {
            prop_assert!(window[0].sequence < window[1].sequence);
        }
    }

    /// After a fully online push, the queue is empty and the remote
    /// agrees with the local store on every surviving record.
    #[test]
    fn push_drains_and_remote_converges(script in mutation_script_strategy(1, 25)) {
        let harness = SyncHarness::new();
        let touched = run_script(&harness, &script);

        let outcome = harness.sync.push_changes().unwrap();
        prop_assert!(!outcome.stalled);
        prop_assert_eq!(harness.sync.pending_count(), 0);
        prop_assert!(harness.sync.dead_letters().unwrap().is_empty());

        // Every live local record has a matching live remote row
        for record in harness.sync.list(RecordKind::Transaction).unwrap() {
            let row = harness.remote.row(RecordKind::Transaction, record.id());
            let row = row.expect("pushed record must exist remotely");
            prop_assert!(!row.deleted);
            prop_assert_eq!(row.payload, Some(record.encode().unwrap()));
        }

        // Every touched-but-deleted id is a tombstone remotely
        for id in touched {
            let local = harness.sync.get(RecordKind::Transaction, id).unwrap();
            if local.is_none() {
                let row = harness.remote.row(RecordKind::Transaction, id);
                let row = row.expect("deleted record must leave a tombstone");
                prop_assert!(row.deleted);
            }
        }
    }

    /// Per-id causal order: for any record, its remote calls happen in
    /// the order its queue entries were created.
    #[test]
    fn per_id_calls_follow_queue_order(script in mutation_script_strategy(1, 25)) {
        let harness = SyncHarness::new();
        run_script(&harness, &script);

        // Capture the expected per-id action order before pushing
        let queue = SyncQueue::open(Arc::clone(&harness.store), harness.owner);
        let expected: Vec<(u64, RecordId)> = queue
            .pending()
            .unwrap()
            .iter()
            .map(|e| (e.sequence, e.record_id))
            .collect();

        harness.sync.push_changes().unwrap();

        let calls = harness.remote.calls();
        prop_assert_eq!(calls.len(), expected.len());

        // Call order equals ascending sequence order
        for (call, (_, id)) in calls.iter().zip(&expected) {
            let call_id = match call {
                tally_sync::RemoteCall::Insert(_, id)
                | tally_sync::RemoteCall::Update(_, id)
                | tally_sync::RemoteCall::Delete(_, id) => *id,
            };
            prop_assert_eq!(call_id, *id);
        }
    }
}

/// A focused regression: updates after a delete re-create the record,
/// and the remote converges on the re-created value.
#[test]
fn update_after_delete_recreates() {
    let harness = SyncHarness::new();
    let record = harness.create_transaction(-100);

    harness
        .sync
        .mutate(Mutation::delete(RecordKind::Transaction, record.id()))
        .unwrap();

    let Record::Transaction(mut txn) = record else {
        unreachable!("transaction");
    };
    txn.amount_minor = -777;
    harness.sync.mutate(Mutation::update(txn)).unwrap();

    harness.sync.push_changes().unwrap();

    let row = harness
        .remote
        .row(RecordKind::Transaction, {
            harness.sync.list(RecordKind::Transaction).unwrap()[0].id()
        })
        .unwrap();
    assert!(!row.deleted);

    let Record::Transaction(stored) =
        Record::decode(RecordKind::Transaction, &row.payload.unwrap()).unwrap()
    else {
        unreachable!("transaction payload");
    };
    assert_eq!(stored.amount_minor, -777);
}
