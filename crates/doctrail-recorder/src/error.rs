use doctrail_history::HistoryError;
use doctrail_store::StoreError;

/// Errors surfaced by recording and by writes routed through a [`Model`].
///
/// A missing prior record is not an error; it becomes
/// [`NoOpReason::TargetMissing`].
///
/// [`Model`]: crate::Model
/// [`NoOpReason::TargetMissing`]: crate::NoOpReason::TargetMissing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    /// Reading or writing the audited records failed.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    /// The history store could not register its container or persist an
    /// event. Propagated unchanged to the caller of the triggering write.
    #[error("history persistence failed: {0}")]
    History(#[from] HistoryError),

    /// Configuration text could not be parsed.
    #[error("invalid history configuration: {0}")]
    Config(String),
}

/// Result alias for recorder operations.
pub type RecorderResult<T> = Result<T, RecorderError>;
