/// Errors from audit container operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Events were sent to a container that was never registered.
    #[error("unknown history container: {0}")]
    UnknownContainer(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    /// A metadata option reuses the name of a standard event field.
    #[error("metadata key {0:?} is reserved for the change event")]
    ReservedMetadataKey(String),

    /// Two metadata options share a key.
    #[error("duplicate metadata key {0:?}")]
    DuplicateMetadataKey(String),

    /// Failure reported by the underlying storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
