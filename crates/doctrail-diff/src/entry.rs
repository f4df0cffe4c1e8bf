//! Change tree produced by the diff engine.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::Serialize;

use doctrail_types::Value;

/// One node of a change tree.
///
/// Serializes as `{"new": .., "old": ..}` for a leaf and as a plain mapping
/// for a nested diff.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiffEntry {
    /// The field's value was replaced. Arrays, dates and mismatched shapes
    /// always land here, carried whole.
    Changed { new: Value, old: Value },
    /// Both sides were objects; only the differing sub-fields are listed.
    Nested(Changes),
}

impl DiffEntry {
    /// Leaf replacement from `old` to `new`.
    pub fn changed(new: Value, old: Value) -> Self {
        Self::Changed { new, old }
    }

    /// Returns `true` for a leaf replacement.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// The `(new, old)` pair of a leaf.
    pub fn leaf(&self) -> Option<(&Value, &Value)> {
        match self {
            Self::Changed { new, old } => Some((new, old)),
            Self::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&Changes> {
        match self {
            Self::Nested(changes) => Some(changes),
            Self::Changed { .. } => None,
        }
    }
}

/// A non-empty mapping from field name to [`DiffEntry`].
///
/// "No difference" is represented by the absence of a `Changes` value, never
/// by an empty one.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Changes(BTreeMap<String, DiffEntry>);

impl Changes {
    /// Wrap a mapping, returning `None` when it is empty.
    pub fn from_map(map: BTreeMap<String, DiffEntry>) -> Option<Self> {
        if map.is_empty() {
            None
        } else {
            Some(Self(map))
        }
    }

    pub fn get(&self, field: &str) -> Option<&DiffEntry> {
        self.0.get(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of top-level fields that changed.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DiffEntry> {
        self.0.iter()
    }

    /// Dotted paths of every leaf in the tree, in key order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (field, entry) in &self.0 {
            let path = if prefix.is_empty() {
                field.clone()
            } else {
                format!("{prefix}.{field}")
            };
            match entry {
                DiffEntry::Changed { .. } => out.push(path),
                DiffEntry::Nested(inner) => inner.collect_paths(&path, out),
            }
        }
    }

    /// Plain JSON form of the change tree.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(field, entry)| {
                    let json = match entry {
                        DiffEntry::Changed { new, old } => {
                            serde_json::json!({ "new": new.to_json(), "old": old.to_json() })
                        }
                        DiffEntry::Nested(inner) => inner.to_json(),
                    };
                    (field.clone(), json)
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = (&'a String, &'a DiffEntry);
    type IntoIter = btree_map::Iter<'a, String, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
