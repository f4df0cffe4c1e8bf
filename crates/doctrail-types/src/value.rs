//! The comparable value tree.
//!
//! A [`Value`] is what a record field holds at a point in time. Unlike
//! `serde_json::Value` it has a first-class [`Value::Date`] variant so that
//! timestamps compare by instant rather than by their textual encoding.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::document::Document;

/// Key of the single-entry object used to carry a date through JSON.
pub const DATE_TAG: &str = "$date";

/// A snapshot value: primitive, date, array or object.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent or explicit null.
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// A timestamp, compared by millisecond instant.
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Document),
}

/// Shared null used when a key is missing from a tree.
pub static NULL: Value = Value::Null;

impl Value {
    /// Build a date value from milliseconds since the UNIX epoch.
    pub fn date_from_millis(ms: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(ms).map(Value::Date)
    }

    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for the shapes that can be descended into:
    /// arrays and objects.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Document> {
        match self {
            Self::Object(doc) => Some(doc),
            _ => None,
        }
    }

    /// Leaf equality: numbers compare by numeric value (`1 == 1.0`) and
    /// dates by millisecond instant. Arrays and objects are never equal here.
    pub fn scalar_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(x), Self::Bool(y)) => x == y,
            (Self::Number(x), Self::Number(y)) => numbers_equal(x, y),
            (Self::String(x), Self::String(y)) => x == y,
            (Self::Date(x), Self::Date(y)) => x.timestamp_millis() == y.timestamp_millis(),
            _ => false,
        }
    }

    /// [`scalar_eq`](Self::scalar_eq) extended through arrays (element by
    /// element) and objects (key by key).
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Array(x), Self::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(a, b)| a.equivalent(b))
            }
            (Self::Object(x), Self::Object(y)) => {
                x.len() == y.len()
                    && x.iter().all(|(key, a)| match y.get(key) {
                        Some(b) => a.equivalent(b),
                        None => false,
                    })
            }
            _ => self.scalar_eq(other),
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Convert to plain JSON. Dates become `{"$date": "<rfc3339>"}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Date(d) => {
                let mut map = serde_json::Map::with_capacity(1);
                map.insert(DATE_TAG.to_string(), format_date(d).into());
                serde_json::Value::Object(map)
            }
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Object(doc) => doc.to_json(),
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    a.as_f64() == b.as_f64()
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_tagged_date(map: &serde_json::Map<String, serde_json::Value>) -> Option<DateTime<Utc>> {
    if map.len() != 1 {
        return None;
    }
    let raw = map.get(DATE_TAG)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => match parse_tagged_date(&map) {
                Some(date) => Self::Date(date),
                None => Self::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, Value::from(v)))
                        .collect(),
                ),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON number form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Self::Number).unwrap_or(Self::Null)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Object(doc)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Self::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_TAG, &format_date(d))?;
                map.end()
            }
            Self::Array(items) => items.serialize(serializer),
            Self::Object(doc) => doc.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
