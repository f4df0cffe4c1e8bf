//! Foundation types for doctrail.
//!
//! Every other doctrail crate depends on `doctrail-types`. It defines the
//! shape of a record snapshot: a tree of [`Value`]s rooted at a
//! [`Document`], plus the [`DocumentId`] that identifies a stored record.
//!
//! # Key Types
//!
//! - [`Value`] -- Tagged union over primitives, dates, arrays and objects
//! - [`Document`] -- Ordered string-keyed mapping of values (a snapshot)
//! - [`DocumentId`] -- UUID v7 record identifier stored under `_id`

pub mod document;
pub mod error;
pub mod id;
pub mod value;

pub use document::Document;
pub use error::TypeError;
pub use id::DocumentId;
pub use value::Value;
