//! Snapshot-level diff: compare two value trees.
//!
//! Keys are taken from the union of both sides. Objects recurse into nested
//! change sets; arrays, dates and primitives become `{new, old}` leaves when
//! they differ. A key missing on one side reads as `null`, so "absent" and
//! "explicit null" are the same thing here.
//!
//! Inputs must be acyclic. `Value` trees built from owned data always are.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use doctrail_types::value::NULL;
use doctrail_types::{Document, Value};

use crate::entry::{Changes, DiffEntry};
use crate::error::{DiffError, DiffResult};

/// Identity and bookkeeping keys skipped at every nesting level.
pub const IGNORED_KEYS: [&str; 3] = ["_id", "updatedAt", "createdAt"];

/// Policy knobs for a diff.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Extra keys skipped at the outermost level only.
    pub omit_paths: BTreeSet<String>,
    /// Report keys that exist only in the old snapshot as `{new: null, old}`.
    pub keep_new_keys: bool,
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to skip at the top level.
    pub fn omit(mut self, path: impl Into<String>) -> Self {
        self.omit_paths.insert(path.into());
        self
    }

    pub fn with_omit_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn keep_new_keys(mut self, keep: bool) -> Self {
        self.keep_new_keys = keep;
        self
    }
}

/// A value that can be walked key by key. Arrays are keyed by index.
#[derive(Clone, Copy)]
enum Tree<'a> {
    Object(&'a Document),
    Array(&'a [Value]),
}

impl<'a> Tree<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::Object(doc) => Some(Self::Object(doc)),
            Value::Array(items) => Some(Self::Array(items)),
            _ => None,
        }
    }

    fn keys(&self) -> Vec<Cow<'a, str>> {
        match self {
            Self::Object(doc) => doc.keys().map(Cow::Borrowed).collect(),
            Self::Array(items) => (0..items.len()).map(|i| Cow::Owned(i.to_string())).collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        match self {
            Self::Object(doc) => doc.get(key),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        }
    }
}

fn require_tree<'a>(value: &'a Value, param: &'static str) -> DiffResult<Tree<'a>> {
    Tree::of(value).ok_or(DiffError::InvalidArgument {
        param,
        expected: "an object or array",
        actual: value.kind(),
    })
}

/// Compute the structural difference from `old` to `current`.
///
/// Returns `Ok(None)` when nothing differs. Both inputs must be objects or
/// arrays; any other top-level value is an `InvalidArgument` error.
pub fn deep_diff(
    current: &Value,
    old: &Value,
    options: &DiffOptions,
) -> DiffResult<Option<Changes>> {
    let current = require_tree(current, "current")?;
    let old = require_tree(old, "old")?;
    Ok(diff_trees(current, old, &options.omit_paths, options.keep_new_keys))
}

/// [`deep_diff`] for two documents, which are always valid inputs.
pub fn diff_documents(
    current: &Document,
    old: &Document,
    options: &DiffOptions,
) -> Option<Changes> {
    diff_trees(
        Tree::Object(current),
        Tree::Object(old),
        &options.omit_paths,
        options.keep_new_keys,
    )
}

/// Structural equality of two arrays.
///
/// Elements are compared pairwise: nested arrays recurse, objects are equal
/// when a diff that also tracks removed keys finds nothing, dates compare by
/// instant, everything else by value. Both inputs must be arrays.
pub fn array_equals(first: &Value, second: &Value) -> DiffResult<bool> {
    match (first, second) {
        (Value::Array(a), Value::Array(b)) => Ok(arrays_equal(a, b)),
        (Value::Array(_), other) => Err(DiffError::InvalidArgument {
            param: "second",
            expected: "an array",
            actual: other.kind(),
        }),
        (other, _) => Err(DiffError::InvalidArgument {
            param: "first",
            expected: "an array",
            actual: other.kind(),
        }),
    }
}

fn diff_trees(
    current: Tree<'_>,
    old: Tree<'_>,
    omit_paths: &BTreeSet<String>,
    keep_new_keys: bool,
) -> Option<Changes> {
    let current_keys = current.keys();
    let old_keys = old.keys();

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut diff = BTreeMap::new();

    for key in current_keys.iter().chain(old_keys.iter()) {
        let key: &str = key;
        if !seen.insert(key) {
            continue;
        }
        if IGNORED_KEYS.contains(&key) || omit_paths.contains(key) {
            continue;
        }

        let present = current.get(key);
        let new_value = present.unwrap_or(&NULL);
        let old_value = old.get(key).unwrap_or(&NULL);

        if new_value.scalar_eq(old_value) {
            continue;
        }

        if present.is_none() {
            if keep_new_keys {
                diff.insert(
                    key.to_string(),
                    DiffEntry::changed(new_value.clone(), old_value.clone()),
                );
            }
            continue;
        }

        if let Some(entry) = compare_values(new_value, old_value, keep_new_keys) {
            diff.insert(key.to_string(), entry);
        }
    }

    Changes::from_map(diff)
}

/// Compare two values already known not to be equal scalars.
fn compare_values(new_value: &Value, old_value: &Value, keep_new_keys: bool) -> Option<DiffEntry> {
    match (new_value, old_value) {
        (Value::Array(a), Value::Array(b)) => {
            if arrays_equal(a, b) {
                None
            } else {
                Some(DiffEntry::changed(new_value.clone(), old_value.clone()))
            }
        }
        (Value::Object(a), Value::Object(b)) => diff_trees(
            Tree::Object(a),
            Tree::Object(b),
            &BTreeSet::new(),
            keep_new_keys,
        )
        .map(DiffEntry::Nested),
        _ => Some(DiffEntry::changed(new_value.clone(), old_value.clone())),
    }
}

fn arrays_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (x, y) {
            (Value::Array(x), Value::Array(y)) => arrays_equal(x, y),
            (Value::Object(x), Value::Object(y)) => {
                diff_trees(Tree::Object(x), Tree::Object(y), &BTreeSet::new(), true).is_none()
            }
            _ => x.scalar_eq(y),
        })
}
