//! Record storage boundary for doctrail.
//!
//! The audit core never talks to a database directly. It reads prior record
//! state and normalizes snapshots through the interfaces defined here, and
//! any backend that implements [`RecordStore`] can sit underneath.
//!
//! # Key Types
//!
//! - [`ModelSchema`] -- Record type identity plus its [`Normalizer`]
//! - [`Filter`] / [`Update`] -- Query and write descriptions
//! - [`RecordStore`] -- Async storage trait
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Normalization is a capability supplied per record type, never inferred
//!    from the record itself.
//! 2. A normalized snapshot never carries `_id`.
//! 3. Missing records are `Ok(None)`, not errors.

pub mod error;
pub mod memory;
pub mod query;
pub mod schema;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use query::{Filter, Update};
pub use schema::{DefaultsNormalizer, FnNormalizer, IdentityNormalizer, ModelSchema, Normalizer};
pub use traits::RecordStore;
