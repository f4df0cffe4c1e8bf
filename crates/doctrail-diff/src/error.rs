//! Error types for the diff crate.

/// Errors that can occur during diff operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// A comparison input did not have the shape the operation requires.
    #[error("invalid argument: {param} must be {expected}, got {actual}")]
    InvalidArgument {
        param: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
