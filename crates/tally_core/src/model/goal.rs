//! Savings goals.

use crate::id::{OwnerId, RecordId};
use crate::time::{DayStamp, Timestamp};
use serde::{Deserialize, Serialize};

/// A savings goal with a target amount and optional deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Display name.
    pub name: String,
    /// Target amount in minor units.
    pub target_minor: i64,
    /// Amount saved so far in minor units.
    pub saved_minor: i64,
    /// Target day, if the goal has a deadline.
    pub target_on: Option<DayStamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl Goal {
    /// Creates a new goal with a fresh client-generated ID.
    #[must_use]
    pub fn new(owner: OwnerId, name: impl Into<String>, target_minor: i64) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            name: name.into(),
            target_minor,
            saved_minor: 0,
            target_on: None,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }
}
