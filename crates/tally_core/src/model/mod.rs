//! Domain records and the tagged union over them.

mod budget;
mod category;
mod goal;
mod preference;
mod recurring;
mod transaction;

pub use budget::{Budget, BudgetAllocation};
pub use category::Category;
pub use goal::Goal;
pub use preference::Preference;
pub use recurring::RecurringRule;
pub use transaction::Transaction;

use crate::error::{CoreError, CoreResult};
use crate::id::{OwnerId, RecordId};
use crate::kind::RecordKind;
use crate::time::Timestamp;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Dispatches an expression over every [`Record`] variant.
macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            Record::Transaction($r) => $body,
            Record::Category($r) => $body,
            Record::Budget($r) => $body,
            Record::BudgetAllocation($r) => $body,
            Record::Goal($r) => $body,
            Record::RecurringRule($r) => $body,
            Record::Preference($r) => $body,
        }
    };
}

/// A domain record of any kind.
///
/// The closed union over the seven synchronized entity types. Payload
/// bytes produced by [`Record::encode`] never embed the kind; the kind
/// always travels beside the payload (store table, queue entry, remote
/// row), so decoding requires it back.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A money movement.
    Transaction(Transaction),
    /// A category.
    Category(Category),
    /// A budget period.
    Budget(Budget),
    /// A per-category budget allocation.
    BudgetAllocation(BudgetAllocation),
    /// A savings goal.
    Goal(Goal),
    /// A recurring transaction rule.
    RecurringRule(RecurringRule),
    /// A settings entry.
    Preference(Preference),
}

impl Record {
    /// Returns the kind of this record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Transaction(_) => RecordKind::Transaction,
            Record::Category(_) => RecordKind::Category,
            Record::Budget(_) => RecordKind::Budget,
            Record::BudgetAllocation(_) => RecordKind::BudgetAllocation,
            Record::Goal(_) => RecordKind::Goal,
            Record::RecurringRule(_) => RecordKind::RecurringRule,
            Record::Preference(_) => RecordKind::Preference,
        }
    }

    /// Returns the record ID.
    #[must_use]
    pub fn id(&self) -> RecordId {
        dispatch!(self, r => r.id)
    }

    /// Returns the owning user.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        dispatch!(self, r => r.owner)
    }

    /// Returns the creation time.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        dispatch!(self, r => r.created_at)
    }

    /// Returns the last modification time.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        dispatch!(self, r => r.updated_at)
    }

    /// Stamps both timestamps, for a freshly created record.
    pub fn stamp_created(&mut self, ts: Timestamp) {
        dispatch!(self, r => {
            r.created_at = ts;
            r.updated_at = ts;
        });
    }

    /// Bumps the modification time.
    pub fn touch(&mut self, ts: Timestamp) {
        dispatch!(self, r => r.updated_at = ts);
    }

    /// Encodes the record payload as CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        dispatch!(self, r => encode_payload(r))
    }

    /// Decodes a record payload of the given kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not decode as the kind.
    pub fn decode(kind: RecordKind, bytes: &[u8]) -> CoreResult<Self> {
        Ok(match kind {
            RecordKind::Transaction => Record::Transaction(decode_payload(kind, bytes)?),
            RecordKind::Category => Record::Category(decode_payload(kind, bytes)?),
            RecordKind::Budget => Record::Budget(decode_payload(kind, bytes)?),
            RecordKind::BudgetAllocation => Record::BudgetAllocation(decode_payload(kind, bytes)?),
            RecordKind::Goal => Record::Goal(decode_payload(kind, bytes)?),
            RecordKind::RecurringRule => Record::RecurringRule(decode_payload(kind, bytes)?),
            RecordKind::Preference => Record::Preference(decode_payload(kind, bytes)?),
        })
    }
}

impl From<Transaction> for Record {
    fn from(r: Transaction) -> Self {
        Record::Transaction(r)
    }
}

impl From<Category> for Record {
    fn from(r: Category) -> Self {
        Record::Category(r)
    }
}

impl From<Budget> for Record {
    fn from(r: Budget) -> Self {
        Record::Budget(r)
    }
}

impl From<BudgetAllocation> for Record {
    fn from(r: BudgetAllocation) -> Self {
        Record::BudgetAllocation(r)
    }
}

impl From<Goal> for Record {
    fn from(r: Goal) -> Self {
        Record::Goal(r)
    }
}

impl From<RecurringRule> for Record {
    fn from(r: RecurringRule) -> Self {
        Record::RecurringRule(r)
    }
}

impl From<Preference> for Record {
    fn from(r: Preference) -> Self {
        Record::Preference(r)
    }
}

fn encode_payload<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| CoreError::Encode(e.to_string()))?;
    Ok(buf)
}

fn decode_payload<T: DeserializeOwned>(kind: RecordKind, bytes: &[u8]) -> CoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CoreError::decode(kind.as_str(), e.to_string()))
}
