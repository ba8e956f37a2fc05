//! Error types for the domain model.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the domain model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// A record payload could not be decoded.
    #[error("decode error for {kind}: {message}")]
    Decode {
        /// Kind the payload was decoded as.
        kind: &'static str,
        /// Underlying codec message.
        message: String,
    },

    /// An unknown record kind name or code.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),
}

impl CoreError {
    /// Creates a decode error for the given kind.
    pub fn decode(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            kind,
            message: message.into(),
        }
    }
}
