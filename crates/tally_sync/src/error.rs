//! Error types for the sync engine.

use tally_core::{RecordId, RecordKind};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store could not commit.
    ///
    /// Surfaced synchronously to the mutation caller; no partial state
    /// exists when this is returned.
    #[error("local storage failure: {0}")]
    Store(#[from] tally_store::StoreError),

    /// A record or queue payload could not be encoded or decoded.
    #[error("codec failure: {0}")]
    Codec(#[from] tally_core::CoreError),

    /// The remote backend could not be reached, or timed out.
    ///
    /// Queue entries and the watermark are left unchanged; the next
    /// trigger retries. Never surfaced to the UI as data loss.
    #[error("remote unavailable: {message}")]
    RemoteUnavailable {
        /// Transport-level description.
        message: String,
    },

    /// The remote backend rejected an operation permanently.
    ///
    /// Retrying cannot succeed; the push path quarantines the entry in
    /// the dead-letter table.
    #[error("remote rejected {kind} {id}: {reason}")]
    RemoteRejected {
        /// Kind of the rejected record.
        kind: RecordKind,
        /// ID of the rejected record.
        id: RecordId,
        /// Server-side reason.
        reason: String,
    },

    /// Persisted queue state failed to decode.
    #[error("queue corrupt at sequence {sequence}: {message}")]
    QueueCorrupt {
        /// Sequence of the bad entry.
        sequence: u64,
        /// Description of the damage.
        message: String,
    },

    /// A mutation carried a record belonging to a different owner.
    #[error("owner mismatch: synchronizer is scoped to {expected}, record belongs to {actual}")]
    OwnerMismatch {
        /// The owner this synchronizer is scoped to.
        expected: tally_core::OwnerId,
        /// The owner on the record.
        actual: tally_core::OwnerId,
    },
}

impl SyncError {
    /// Creates a remote-unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Creates a remote-rejected error.
    pub fn rejected(kind: RecordKind, id: RecordId, reason: impl Into<String>) -> Self {
        Self::RemoteRejected {
            kind,
            id,
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable { .. })
    }
}
