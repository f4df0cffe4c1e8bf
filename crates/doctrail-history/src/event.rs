use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doctrail_diff::Changes;
use doctrail_types::{Document, DocumentId, Value};

/// Unique identifier for a change event (UUID v7 for time-ordering).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(uuid::Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.short_id())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt:{}", self.short_id())
    }
}

/// What a write did to its record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    /// The write could not be classified.
    Undefined,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Undefined => "undefined",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The data-access operation that triggered a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteMethod {
    Save,
    InsertMany,
    UpdateOne,
    FindOneAndUpdate,
    FindByIdAndUpdate,
    ReplaceOne,
    FindOneAndReplace,
    DeleteOne,
    FindOneAndDelete,
    FindByIdAndDelete,
    DeleteMany,
    UpdateMany,
}

impl WriteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::InsertMany => "insertMany",
            Self::UpdateOne => "updateOne",
            Self::FindOneAndUpdate => "findOneAndUpdate",
            Self::FindByIdAndUpdate => "findByIdAndUpdate",
            Self::ReplaceOne => "replaceOne",
            Self::FindOneAndReplace => "findOneAndReplace",
            Self::DeleteOne => "deleteOne",
            Self::FindOneAndDelete => "findOneAndDelete",
            Self::FindByIdAndDelete => "findByIdAndDelete",
            Self::DeleteMany => "deleteMany",
            Self::UpdateMany => "updateMany",
        }
    }

    /// Returns `true` for operations that may touch many records.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::InsertMany | Self::DeleteMany | Self::UpdateMany)
    }
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The audit record of one qualifying write.
///
/// Built once, handed to a [`HistoryStore`](crate::HistoryStore), never
/// mutated afterward. An event always carries a non-empty [`Changes`]: a
/// write with no observed difference produces no event at all.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub id: EventId,
    pub action: ChangeAction,
    pub method: WriteMethod,
    pub model_name: String,
    pub collection_name: String,
    pub document_id: Option<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<Value>,
    pub changes: Changes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Document>,
    pub created_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// A new event stamped with a fresh id and the current time. Snapshots,
    /// identity and actor are attached with the `with_*` builders.
    pub fn new(
        action: ChangeAction,
        method: WriteMethod,
        model_name: impl Into<String>,
        collection_name: impl Into<String>,
        changes: Changes,
    ) -> Self {
        Self {
            id: EventId::new(),
            action,
            method,
            model_name: model_name.into(),
            collection_name: collection_name.into(),
            document_id: None,
            modified_by: None,
            changes,
            old_document: None,
            current_document: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_document_id(mut self, id: Option<DocumentId>) -> Self {
        self.document_id = id;
        self
    }

    pub fn with_modified_by(mut self, actor: Option<Value>) -> Self {
        self.modified_by = actor;
        self
    }

    /// Attach the full before/after snapshots.
    pub fn with_snapshots(mut self, old: Document, current: Document) -> Self {
        self.old_document = Some(old);
        self.current_document = Some(current);
        self
    }

    /// Returns `true` if the full snapshots were dropped (diff-only mode).
    pub fn is_diff_only(&self) -> bool {
        self.old_document.is_none() && self.current_document.is_none()
    }
}

/// A persisted change event together with its evaluated metadata fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub event: ChangeEvent,
    #[serde(flatten)]
    pub metadata: Document,
}
