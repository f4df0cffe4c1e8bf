//! Query and update descriptions understood by every [`RecordStore`].
//!
//! [`RecordStore`]: crate::RecordStore

use std::collections::BTreeSet;

use doctrail_types::{Document, DocumentId, Value};

/// Top-level field equality filter. An empty filter matches every record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Document,
}

impl Filter {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match the record with this identity.
    pub fn by_id(id: DocumentId) -> Self {
        Self::all().eq(Document::ID_FIELD, id.to_value())
    }

    /// Add an equality condition on `field`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &Document {
        &self.conditions
    }

    /// The identity this filter pins, if it has an `_id` condition.
    pub fn target_id(&self) -> Option<DocumentId> {
        self.conditions.id()
    }

    /// Returns `true` if every condition holds on `record`. Values compare
    /// with [`Value::equivalent`], the same rule the diff engine applies to
    /// leaves.
    pub fn matches(&self, record: &Document) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            record
                .get(field)
                .unwrap_or(&Value::Null)
                .equivalent(expected)
        })
    }
}

/// A write applied to one stored record.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// Merge `set` into the record, then remove every `unset` key.
    Modify {
        set: Document,
        unset: BTreeSet<String>,
    },
    /// Swap the whole record body, keeping its identity.
    Replace(Document),
}

impl Update {
    /// A modification that sets one field.
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::modify().and_set(field, value)
    }

    /// A modification that removes one field.
    pub fn unset(field: impl Into<String>) -> Self {
        Self::modify().and_unset(field)
    }

    /// A modification setting every field of `fields`.
    pub fn set_all(fields: Document) -> Self {
        Self::Modify {
            set: fields,
            unset: BTreeSet::new(),
        }
    }

    pub fn replace(document: Document) -> Self {
        Self::Replace(document)
    }

    fn modify() -> Self {
        Self::Modify {
            set: Document::new(),
            unset: BTreeSet::new(),
        }
    }

    /// Add a set clause. A replacement is turned into a field on the body.
    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self {
            Self::Modify { set, .. } => {
                set.insert(field, value);
            }
            Self::Replace(body) => {
                body.insert(field, value);
            }
        }
        self
    }

    /// Add an unset clause. A replacement simply loses the field.
    pub fn and_unset(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        match &mut self {
            Self::Modify { unset, .. } => {
                unset.insert(field);
            }
            Self::Replace(body) => {
                body.remove(&field);
            }
        }
        self
    }

    /// Fields an update explicitly removes. Empty for replacements.
    pub fn unset_fields(&self) -> impl Iterator<Item = &str> {
        let unset = match self {
            Self::Modify { unset, .. } => Some(unset),
            Self::Replace(_) => None,
        };
        unset.into_iter().flatten().map(String::as_str)
    }

    pub fn is_replacement(&self) -> bool {
        matches!(self, Self::Replace(_))
    }

    /// The record as it will look after this update. `_id` is never changed.
    pub fn apply(&self, target: &Document) -> Document {
        let mut out = match self {
            Self::Modify { set, unset } => {
                let mut out = target.clone();
                for (field, value) in set {
                    out.insert(field.clone(), value.clone());
                }
                for field in unset {
                    out.remove(field);
                }
                out
            }
            Self::Replace(body) => body.clone(),
        };
        out.remove(Document::ID_FIELD);
        if let Some(id) = target.get(Document::ID_FIELD) {
            out.insert(Document::ID_FIELD, id.clone());
        }
        out
    }
}
