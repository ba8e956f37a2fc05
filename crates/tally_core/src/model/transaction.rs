//! Money movements.

use crate::id::{OwnerId, RecordId};
use crate::time::{DayStamp, Timestamp};
use serde::{Deserialize, Serialize};

/// A single money movement.
///
/// Amounts are in minor currency units (cents); the sign encodes the
/// direction (negative = spending). Currency and formatting are UI
/// concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Category this movement belongs to, if assigned.
    pub category: Option<RecordId>,
    /// Amount in minor units; negative for spending.
    pub amount_minor: i64,
    /// Free-form note.
    pub memo: Option<String>,
    /// Day the movement occurred.
    pub occurred_on: DayStamp,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl Transaction {
    /// Creates a new transaction with a fresh client-generated ID.
    ///
    /// Timestamps start at zero; the mutation coordinator stamps them.
    #[must_use]
    pub fn new(owner: OwnerId, amount_minor: i64, occurred_on: DayStamp) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            category: None,
            amount_minor,
            memo: None,
            occurred_on,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: RecordId) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_distinct_ids() {
        let owner = OwnerId::new();
        let a = Transaction::new(owner, -1250, DayStamp::from_days(20_000));
        let b = Transaction::new(owner, -1250, DayStamp::from_days(20_000));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn builder_fields() {
        let owner = OwnerId::new();
        let category = RecordId::new();
        let txn = Transaction::new(owner, 5000, DayStamp::from_days(20_000))
            .with_category(category)
            .with_memo("salary");

        assert_eq!(txn.category, Some(category));
        assert_eq!(txn.memo.as_deref(), Some("salary"));
        assert_eq!(txn.created_at, Timestamp::ZERO);
    }
}
