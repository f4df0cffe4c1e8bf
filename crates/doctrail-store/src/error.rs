use doctrail_types::DocumentId;

/// Errors from record store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A record with this id already exists in the collection.
    #[error("duplicate document id {id} in collection {collection}")]
    DuplicateId {
        collection: String,
        id: DocumentId,
    },

    /// An internal lock was poisoned by a panicking writer.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    /// Failure reported by the underlying storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
