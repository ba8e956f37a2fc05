//! Timestamps and day stamps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A wall-clock timestamp in microseconds since the Unix epoch.
///
/// Timestamps are the sole basis for conflict resolution: the record copy
/// with the greater `updated_at` wins (last-write-wins). They also drive
/// the pull watermark.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The zero timestamp, ordered before every real one.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from raw microseconds.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the raw microsecond value.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self(micros)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

/// A calendar day as whole days since the Unix epoch.
///
/// Used for fields where the time of day is meaningless (transaction
/// dates, budget periods, goal targets). Formatting is a UI concern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DayStamp(pub u32);

impl DayStamp {
    /// Creates a day stamp from days since the epoch.
    #[must_use]
    pub const fn from_days(days: u32) -> Self {
        Self(days)
    }

    /// Returns the raw day count.
    #[must_use]
    pub const fn as_days(self) -> u32 {
        self.0
    }

    /// Truncates a timestamp to its day.
    #[must_use]
    pub const fn from_timestamp(ts: Timestamp) -> Self {
        const MICROS_PER_DAY: u64 = 24 * 60 * 60 * 1_000_000;
        Self((ts.as_micros() / MICROS_PER_DAY) as u32)
    }

    /// Returns this day advanced by `days`.
    #[must_use]
    pub const fn plus_days(self, days: u32) -> Self {
        Self(self.0 + days)
    }
}

impl fmt::Display for DayStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day:{}", self.0)
    }
}
