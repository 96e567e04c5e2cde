//! Error types for SINISTRO reference-data operations

use thiserror::Error;

/// Reference-data layer errors.
///
/// None of these ever reach rendering code as a fault: storage failures are
/// absorbed by the persistent cache, malformed records are dropped at load
/// time, and fetch failures are carried on the collection state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefDataError {
    #[error("Persistent cache unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("Fetch failed for {collection}: {message}")]
    FetchFailed { collection: String, message: String },

    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },
}

impl RefDataError {
    /// Build a fetch failure for the given collection label.
    pub fn fetch_failed(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            collection: collection.into(),
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Whether a consuming UI should offer a retry affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }
}

/// Result type for reference-data operations.
pub type RefDataResult<T> = Result<T, RefDataError>;
