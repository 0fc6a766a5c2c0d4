//! Canonical error kinds for storage, ingestion and retrieval.

/// Error type shared by every storage, ingestion and retrieval operation.
///
/// Not-found is decided once, by the [`ObjectStore`](crate::store::ObjectStore)
/// implementation, and travels as [`Error::NotFound`]. Callers match on the
/// variant, never on the message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The requested object does not exist in the store.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// The object store could not be reached or rejected the request.
    #[error("storage error: {0}")]
    Transport(String),

    /// A payload could not be parsed as the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Input failed a precondition check.
    #[error("validation error: {0}")]
    Validation(String),

    /// The external data source failed or returned a non-success status.
    #[error("failed to fetch external data: {0}")]
    Upstream(String),

    /// The latest-ingestion pointer exists but is unusable.
    #[error("invalid latest-ingestion metadata: {0}")]
    InvalidPointer(String),

    /// The latest-ingestion pointer names an artifact that cannot be read.
    #[error("latest-ingestion metadata references unreadable artifact {filename}: {reason}")]
    DanglingPointer { filename: String, reason: String },
}

impl Error {
    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
