//! Budgets and their per-category allocations.

use crate::id::{OwnerId, RecordId};
use crate::time::{DayStamp, Timestamp};
use serde::{Deserialize, Serialize};

/// A budgeting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Display name.
    pub name: String,
    /// First day of the period.
    pub period_start: DayStamp,
    /// Period length in days.
    pub period_days: u16,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl Budget {
    /// Creates a new budget with a fresh client-generated ID.
    #[must_use]
    pub fn new(
        owner: OwnerId,
        name: impl Into<String>,
        period_start: DayStamp,
        period_days: u16,
    ) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            name: name.into(),
            period_start,
            period_days,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }

    /// Returns the first day after the period.
    #[must_use]
    pub fn period_end(&self) -> DayStamp {
        self.period_start.plus_days(u32::from(self.period_days))
    }
}

/// A planned amount for one category within a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// The budget this allocation belongs to.
    pub budget: RecordId,
    /// The category being budgeted.
    pub category: RecordId,
    /// Planned amount in minor units.
    pub planned_minor: i64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl BudgetAllocation {
    /// Creates a new allocation with a fresh client-generated ID.
    #[must_use]
    pub fn new(owner: OwnerId, budget: RecordId, category: RecordId, planned_minor: i64) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            budget,
            category,
            planned_minor,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }
}
