use std::fmt;

use doctrail_history::{ChangeAction, ChangeEvent, WriteMethod};
use doctrail_store::ModelSchema;
use doctrail_types::{Document, DocumentId, Value};

/// Kind of write being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// First persist of a new record.
    Create,
    /// Full save of a record that already exists.
    Update,
    /// Removal of at most one record.
    Delete,
    /// One record of a bulk insert.
    BulkInsert,
    /// Query-targeted update of a single record.
    TargetedUpdate,
    /// One matched record of a bulk update.
    BulkUpdate,
    /// One matched record of a bulk delete.
    BulkDelete,
}

impl OperationKind {
    pub fn action(&self) -> ChangeAction {
        match self {
            Self::Create | Self::BulkInsert => ChangeAction::Created,
            Self::Update | Self::TargetedUpdate | Self::BulkUpdate => ChangeAction::Updated,
            Self::Delete | Self::BulkDelete => ChangeAction::Deleted,
        }
    }

    /// Bulk updates and deletes, which are only audited on request.
    pub fn is_bulk_write(&self) -> bool {
        matches!(self, Self::BulkUpdate | Self::BulkDelete)
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Delete | Self::BulkDelete)
    }

    /// Creations have no prior state to fetch.
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Create | Self::BulkInsert)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkInsert => "bulk-insert",
            Self::TargetedUpdate => "targeted-update",
            Self::BulkUpdate => "bulk-update",
            Self::BulkDelete => "bulk-delete",
        };
        f.write_str(s)
    }
}

/// Everything the recorder needs to decide on one write.
///
/// Snapshots are expected to be normalized already. `old` is `None` when a
/// prior state was expected but could not be found.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordContext {
    pub kind: OperationKind,
    pub method: WriteMethod,
    pub model_name: String,
    pub collection_name: String,
    pub document_id: Option<DocumentId>,
    pub old: Option<Document>,
    pub current: Document,
    pub actor: Option<Value>,
}

impl RecordContext {
    /// A context for `schema`. Creations start from an empty prior snapshot;
    /// every other kind starts with the prior state missing.
    pub fn new(kind: OperationKind, method: WriteMethod, schema: &ModelSchema) -> Self {
        Self {
            kind,
            method,
            model_name: schema.model_name().to_string(),
            collection_name: schema.collection_name().to_string(),
            document_id: None,
            old: kind.is_creation().then(Document::new),
            current: Document::new(),
            actor: None,
        }
    }

    pub fn with_document_id(mut self, id: Option<DocumentId>) -> Self {
        self.document_id = id;
        self
    }

    pub fn with_old(mut self, old: Option<Document>) -> Self {
        self.old = old;
        self
    }

    pub fn with_current(mut self, current: Document) -> Self {
        self.current = current;
        self
    }

    pub fn with_actor(mut self, actor: Option<Value>) -> Self {
        self.actor = actor;
        self
    }
}

/// Why a write produced no event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoOpReason {
    /// The snapshots did not differ.
    NoChanges,
    /// The record was gone before its prior state could be read.
    TargetMissing,
    /// A bulk update or delete while bulk auditing is off.
    BulkAuditDisabled,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoChanges => "no changes",
            Self::TargetMissing => "target missing",
            Self::BulkAuditDisabled => "bulk audit disabled",
        };
        f.write_str(s)
    }
}

/// Result of recording one write.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    /// The event was built and persisted.
    Recorded(ChangeEvent),
    NoOp(NoOpReason),
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    pub fn event(&self) -> Option<&ChangeEvent> {
        match self {
            Self::Recorded(event) => Some(event),
            Self::NoOp(_) => None,
        }
    }

    pub fn into_event(self) -> Option<ChangeEvent> {
        match self {
            Self::Recorded(event) => Some(event),
            Self::NoOp(_) => None,
        }
    }

    pub fn no_op_reason(&self) -> Option<NoOpReason> {
        match self {
            Self::Recorded(_) => None,
            Self::NoOp(reason) => Some(*reason),
        }
    }
}
