use thiserror::Error;

/// Errors produced by type conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid document id: {0}")]
    InvalidId(String),
}
