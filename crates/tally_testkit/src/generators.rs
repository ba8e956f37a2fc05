//! Property-based test generators using proptest.
//!
//! Provides strategies for random records and mutation scripts that
//! maintain the domain's invariants (stable ids, one owner per script).

use proptest::prelude::*;
use tally_core::{
    Budget, Category, DayStamp, Goal, OwnerId, Preference, Record, RecordId, RecordKind,
    RecurringRule, Timestamp, Transaction,
};

/// Strategy for record IDs.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    prop::array::uniform16(any::<u8>()).prop_map(RecordId::from_bytes)
}

/// Strategy for timestamps within a practical range.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (1u64..=u64::from(u32::MAX)).prop_map(Timestamp::from_micros)
}

/// Strategy for amounts in minor units, spending or income.
pub fn amount_strategy() -> impl Strategy<Value = i64> {
    -1_000_000i64..=1_000_000i64
}

/// Strategy for short human-entered names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}").expect("valid regex")
}

/// Strategy for a record of the given kind, owned by `owner`.
pub fn record_strategy(owner: OwnerId, kind: RecordKind) -> BoxedStrategy<Record> {
    match kind {
        RecordKind::Transaction => (amount_strategy(), 0u32..50_000)
            .prop_map(move |(amount, day)| {
                Transaction::new(owner, amount, DayStamp::from_days(day)).into()
            })
            .boxed(),
        RecordKind::Category => name_strategy()
            .prop_map(move |name| Category::new(owner, name).into())
            .boxed(),
        RecordKind::Budget => (name_strategy(), 0u32..50_000, 1u16..366)
            .prop_map(move |(name, start, days)| {
                Budget::new(owner, name, DayStamp::from_days(start), days).into()
            })
            .boxed(),
        RecordKind::BudgetAllocation => {
            (record_id_strategy(), record_id_strategy(), amount_strategy())
                .prop_map(move |(budget, category, planned)| {
                    tally_core::BudgetAllocation::new(owner, budget, category, planned).into()
                })
                .boxed()
        }
        RecordKind::Goal => (name_strategy(), 1i64..10_000_000)
            .prop_map(move |(name, target)| Goal::new(owner, name, target).into())
            .boxed(),
        RecordKind::RecurringRule => (amount_strategy(), 1u16..366, 0u32..50_000)
            .prop_map(move |(amount, interval, next)| {
                RecurringRule::new(owner, amount, interval, DayStamp::from_days(next)).into()
            })
            .boxed(),
        RecordKind::Preference => (name_strategy(), name_strategy())
            .prop_map(move |(key, value)| Preference::new(owner, key, value).into())
            .boxed(),
    }
}

/// Strategy for a record of any kind, owned by `owner`.
pub fn any_record_strategy(owner: OwnerId) -> BoxedStrategy<Record> {
    prop::sample::select(RecordKind::ALL.to_vec())
        .prop_flat_map(move |kind| record_strategy(owner, kind))
        .boxed()
}

/// One step of a mutation script.
///
/// Steps reference earlier creations by index so scripts stay valid
/// regardless of which ids the creations produce.
#[derive(Debug, Clone)]
pub enum MutationStep {
    /// Create a new transaction with the amount.
    Create {
        /// Amount in minor units.
        amount_minor: i64,
    },
    /// Update the `index`-th created record (modulo the live count).
    Update {
        /// Index into the created records.
        index: usize,
        /// New amount in minor units.
        amount_minor: i64,
    },
    /// Delete the `index`-th created record (modulo the live count).
    Delete {
        /// Index into the created records.
        index: usize,
    },
}

/// Strategy for a single mutation step.
pub fn mutation_step_strategy() -> impl Strategy<Value = MutationStep> {
    prop_oneof![
        3 => amount_strategy().prop_map(|amount_minor| MutationStep::Create { amount_minor }),
        2 => (any::<usize>(), amount_strategy())
            .prop_map(|(index, amount_minor)| MutationStep::Update { index, amount_minor }),
        1 => any::<usize>().prop_map(|index| MutationStep::Delete { index }),
    ]
}

/// Strategy for a mutation script of the given length range.
pub fn mutation_script_strategy(
    min_steps: usize,
    max_steps: usize,
) -> impl Strategy<Value = Vec<MutationStep>> {
    prop::collection::vec(mutation_step_strategy(), min_steps..max_steps)
}
