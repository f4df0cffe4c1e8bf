//! Change recording for doctrail.
//!
//! Every qualifying write is turned into at most one [`ChangeEvent`]: the
//! prior and new snapshots of the record are normalized, diffed, and the
//! event is persisted only when something actually changed.
//!
//! # Key Types
//!
//! - [`HistoryOptions`] -- Auditing policy, loadable from TOML
//! - [`ChangeRecorder`] -- Decision table and persistence of change events
//! - [`RecordContext`] / [`RecordOutcome`] -- One write in, one outcome out
//! - [`ActorContext`] -- Per-request actor resolution
//! - [`WriteHook`] / [`HistoryHook`] -- Lifecycle callbacks that drive the recorder
//! - [`Model`] -- Data-access handle that fires hooks around a record store
//!
//! # Design Rules
//!
//! 1. No difference, no event. An empty diff is never persisted.
//! 2. A record that disappeared before its prior state was read is skipped,
//!    not reported as an error.
//! 3. Persistence failures propagate to the caller of the write.
//! 4. The actor is resolved once per write and never cached.
//!
//! [`ChangeEvent`]: doctrail_history::ChangeEvent

pub mod actor;
pub mod config;
pub mod error;
pub mod hooks;
pub mod model;
pub mod operation;
pub mod recorder;

pub use actor::{
    current_request_context, with_request_context, ActorContext, NoActorContext,
    StaticActorContext, TaskLocalActorContext,
};
pub use config::{HistoryOptions, ModifiedByOptions, DEFAULT_CONTAINER_NAME, DEFAULT_CONTEXT_PATH};
pub use error::{RecorderError, RecorderResult};
pub use hooks::{HistoryHook, NoOpHook, WriteHook};
pub use model::Model;
pub use operation::{NoOpReason, OperationKind, RecordContext, RecordOutcome};
pub use recorder::ChangeRecorder;
