use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::DocumentId;
use crate::value::Value;

/// A record snapshot: string keys mapped to [`Value`]s.
///
/// Keys are kept sorted, so iteration order is deterministic regardless of
/// insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Key under which a record's identity is stored.
    pub const ID_FIELD: &'static str = "_id";

    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self, TypeError> {
        match Value::from(json) {
            Value::Object(doc) => Ok(doc),
            other => Err(TypeError::NotAnObject(other.kind())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert a field, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// The record identity stored under `_id`, if it parses.
    pub fn id(&self) -> Option<DocumentId> {
        self.get(Self::ID_FIELD).and_then(DocumentId::from_value)
    }

    /// Set the record identity under `_id`.
    pub fn set_id(&mut self, id: DocumentId) {
        self.insert(Self::ID_FIELD, id.to_value());
    }

    /// A copy of this document without its `_id` field.
    pub fn without_id(&self) -> Self {
        let mut copy = self.clone();
        copy.remove(Self::ID_FIELD);
        copy
    }

    /// Convert to plain JSON (see [`Value::to_json`]).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}
