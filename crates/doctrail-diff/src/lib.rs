//! Structural diff engine for doctrail.
//!
//! Compares two record snapshots and reduces them to the minimal tree of
//! `{new, old}` pairs describing what differs. Objects are descended into;
//! arrays and dates are compared as a whole and replaced wholesale in the
//! output when they differ.
//!
//! # Key Types
//!
//! - [`deep_diff`] / [`diff_documents`] -- Snapshot comparison
//! - [`array_equals`] -- Structural array equality used by the diff
//! - [`Changes`] / [`DiffEntry`] -- Non-empty change tree
//! - [`DiffOptions`] -- Omitted paths and key-removal tracking

pub mod entry;
pub mod error;
pub mod tree_diff;

pub use entry::{Changes, DiffEntry};
pub use error::{DiffError, DiffResult};
pub use tree_diff::{array_equals, deep_diff, diff_documents, DiffOptions, IGNORED_KEYS};
