//! Per-owner settings entries.

use crate::id::{OwnerId, RecordId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A per-owner settings entry (currency code, first weekday, ...).
///
/// Preferences sync like any other record so settings follow the owner
/// across devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Setting key.
    pub key: String,
    /// Setting value.
    pub value: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl Preference {
    /// Creates a new preference with a fresh client-generated ID.
    #[must_use]
    pub fn new(owner: OwnerId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            key: key.into(),
            value: value.into(),
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }
}
