//! Spending and income categories.

use crate::id::{OwnerId, RecordId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A spending/income category, optionally nested under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Client-generated record ID.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Display name.
    pub name: String,
    /// Parent category for nesting, if any.
    pub parent: Option<RecordId>,
    /// Archived categories are hidden from pickers but keep history.
    pub archived: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time; basis for last-write-wins.
    pub updated_at: Timestamp,
}

impl Category {
    /// Creates a new category with a fresh client-generated ID.
    #[must_use]
    pub fn new(owner: OwnerId, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            name: name.into(),
            parent: None,
            archived: false,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
        }
    }

    /// Nests this category under a parent.
    #[must_use]
    pub fn with_parent(mut self, parent: RecordId) -> Self {
        self.parent = Some(parent);
        self
    }
}
