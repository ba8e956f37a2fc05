//! Table identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a logical table in the store.
///
/// Table IDs are stable one-byte codes. Domain tables occupy low codes;
/// codes at `RESERVED_BASE` and above are reserved for engine-internal
/// tables (sync queue, dead letters, metadata).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TableId(pub u8);

impl TableId {
    /// First table code reserved for engine-internal tables.
    pub const RESERVED_BASE: u8 = 0xF0;

    /// Creates a new table ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns true if this is an engine-reserved table.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 >= Self::RESERVED_BASE
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table:{}", self.0)
    }
}
