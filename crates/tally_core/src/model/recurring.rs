//! Recurring transaction rules.

use crate::id::{OwnerId, RecordId};
use crate::time::{DayStamp, Timestamp};
use serde::{Deserialize, Serialize};

/// A template that spawns transactions on a fixed-interval schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringRule {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Category applied to spawned transactions.
    pub category: Option<RecordId>,
    /// Amount in minor units applied to spawned transactions.
    pub amount_minor: i64,
    /// Memo applied to spawned transactions.
    pub memo: Option<String>,
    /// Days between occurrences.
    pub interval_days: u16,
    /// Day of the next occurrence.
    pub next_on: DayStamp,
    /// Paused rules spawn nothing until resumed.
    pub paused: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl RecurringRule {
    /// Creates a new rule with a fresh client-generated ID.
    #[must_use]
    pub fn new(owner: OwnerId, amount_minor: i64, interval_days: u16, next_on: DayStamp) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            category: None,
            amount_minor,
            memo: None,
            interval_days,
            next_on,
            paused: false,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }

    /// Advances `next_on` by one interval.
    pub fn advance(&mut self) {
        self.next_on = self.next_on.plus_days(u32::from(self.interval_days));
    }
}
