//! The closed set of record kinds.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_store::TableId;

/// The kind of a domain record.
///
/// This is a closed enum: every synchronized table is one of these, and
/// all dispatch (store tables, queue entries, remote rows) goes through
/// it rather than through free-form table names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RecordKind {
    /// A single money movement.
    Transaction,
    /// A spending/income category.
    Category,
    /// A budgeting period.
    Budget,
    /// A planned amount for one category within a budget.
    BudgetAllocation,
    /// A savings goal.
    Goal,
    /// A template that spawns transactions on a schedule.
    RecurringRule,
    /// A per-owner settings entry.
    Preference,
}

impl RecordKind {
    /// Every kind, in table-code order.
    pub const ALL: [RecordKind; 7] = [
        RecordKind::Transaction,
        RecordKind::Category,
        RecordKind::Budget,
        RecordKind::BudgetAllocation,
        RecordKind::Goal,
        RecordKind::RecurringRule,
        RecordKind::Preference,
    ];

    /// Returns the stable one-byte table code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            RecordKind::Transaction => 1,
            RecordKind::Category => 2,
            RecordKind::Budget => 3,
            RecordKind::BudgetAllocation => 4,
            RecordKind::Goal => 5,
            RecordKind::RecurringRule => 6,
            RecordKind::Preference => 7,
        }
    }

    /// Converts from a table code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(RecordKind::Transaction),
            2 => Some(RecordKind::Category),
            3 => Some(RecordKind::Budget),
            4 => Some(RecordKind::BudgetAllocation),
            5 => Some(RecordKind::Goal),
            6 => Some(RecordKind::RecurringRule),
            7 => Some(RecordKind::Preference),
            _ => None,
        }
    }

    /// Returns the store table this kind lives in.
    #[must_use]
    pub const fn table(self) -> TableId {
        TableId::new(self.code())
    }

    /// Returns the canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Transaction => "transaction",
            RecordKind::Category => "category",
            RecordKind::Budget => "budget",
            RecordKind::BudgetAllocation => "budget_allocation",
            RecordKind::Goal => "goal",
            RecordKind::RecurringRule => "recurring_rule",
            RecordKind::Preference => "preference",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transaction" => Ok(RecordKind::Transaction),
            "category" => Ok(RecordKind::Category),
            "budget" => Ok(RecordKind::Budget),
            "budget_allocation" => Ok(RecordKind::BudgetAllocation),
            "goal" => Ok(RecordKind::Goal),
            "recurring_rule" => Ok(RecordKind::RecurringRule),
            "preference" => Ok(RecordKind::Preference),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(RecordKind::from_code(0), None);
        assert_eq!(RecordKind::from_code(99), None);
    }

    #[test]
    fn names_roundtrip() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("account".parse::<RecordKind>().is_err());
    }

    #[test]
    fn tables_are_distinct_and_unreserved() {
        let mut tables: Vec<_> = RecordKind::ALL.iter().map(|k| k.table()).collect();
        tables.dedup();
        assert_eq!(tables.len(), RecordKind::ALL.len());
        assert!(tables.iter().all(|t| !t.is_reserved()));
    }
}
