//! Audit container for doctrail.
//!
//! A [`ChangeEvent`] is the audit record of one qualifying write. This crate
//! defines the event, the shape of the container events are stored in, and
//! the [`HistoryStore`] boundary that registers containers and persists
//! events.
//!
//! # Key Types
//!
//! - [`ChangeEvent`] -- One audit record: action, method, identity, diff
//! - [`ChangeAction`] / [`WriteMethod`] -- What happened and which API fired
//! - [`ContainerShape`] / [`IndexSpec`] / [`MetadataOption`] -- Container layout
//! - [`HistoryStore`] -- Async persistence trait
//! - [`InMemoryHistoryStore`] -- In-memory store for tests and embedding

pub mod container;
pub mod error;
pub mod event;
pub mod memory;
pub mod traits;

pub use container::{
    ContainerHandle, ContainerShape, FieldType, IndexDirection, IndexSpec, MetadataFn,
    MetadataOption, MetadataValue, RESERVED_FIELDS,
};
pub use error::{HistoryError, HistoryResult};
pub use event::{ChangeAction, ChangeEvent, EventId, HistoryRecord, WriteMethod};
pub use memory::InMemoryHistoryStore;
pub use traits::HistoryStore;
