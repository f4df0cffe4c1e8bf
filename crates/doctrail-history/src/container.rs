//! Layout of the container change events are stored in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use doctrail_types::{Document, Value};

use crate::error::{HistoryError, HistoryResult};

/// Storage type of one container field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    #[default]
    ObjectId,
    Object,
    /// Any value; the backend does not type the field.
    Mixed,
}

/// Sort direction of one index key, written `1` or `-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum IndexDirection {
    Ascending,
    Descending,
}

impl TryFrom<i64> for IndexDirection {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ascending),
            -1 => Ok(Self::Descending),
            other => Err(format!("index direction must be 1 or -1, got {other}")),
        }
    }
}

impl From<IndexDirection> for i64 {
    fn from(direction: IndexDirection) -> Self {
        match direction {
            IndexDirection::Ascending => 1,
            IndexDirection::Descending => -1,
        }
    }
}

/// A secondary lookup structure requested on the audit container. Passed
/// through verbatim to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSpec {
    pub keys: BTreeMap<String, IndexDirection>,
    pub unique: bool,
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.keys.insert(field.into(), IndexDirection::Ascending);
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.keys.insert(field.into(), IndexDirection::Descending);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Computes a metadata value from the `(old, current)` snapshots.
pub type MetadataFn = Arc<dyn Fn(&Document, &Document) -> Value + Send + Sync>;

/// Value of an extra metadata field.
#[derive(Clone)]
pub enum MetadataValue {
    Static(Value),
    /// Evaluated by the history store when an event is persisted.
    Computed(MetadataFn),
}

impl MetadataValue {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Document, &Document) -> Value + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    pub fn evaluate(&self, old: &Document, current: &Document) -> Value {
        match self {
            Self::Static(value) => value.clone(),
            Self::Computed(f) => f(old, current),
        }
    }
}

impl fmt::Debug for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// Configuration text can only express static values.
impl<'de> Deserialize<'de> for MetadataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::Static)
    }
}

/// An extra field attached to every event in a container.
#[derive(Clone, Debug, Deserialize)]
pub struct MetadataOption {
    pub key: String,
    pub value: MetadataValue,
    #[serde(default)]
    pub schema: Option<FieldType>,
}

impl MetadataOption {
    pub fn fixed(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: MetadataValue::Static(value.into()),
            schema: None,
        }
    }

    pub fn computed<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document, &Document) -> Value + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            value: MetadataValue::computed(f),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: FieldType) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Names every stored change event already uses. Metadata may not take them.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "action",
    "method",
    "modelName",
    "collectionName",
    "documentId",
    "modifiedBy",
    "changes",
    "oldDocument",
    "currentDocument",
    "createdAt",
];

/// Field layout of an audit container.
#[derive(Clone, Debug)]
pub struct ContainerShape {
    fields: BTreeMap<String, FieldType>,
    metadata: Vec<MetadataOption>,
}

impl ContainerShape {
    /// The standard change-event layout. `modified_by` types the actor field;
    /// each metadata option adds a field typed by its schema, or `Mixed`.
    ///
    /// Fails if a metadata key is one of [`RESERVED_FIELDS`] or appears twice.
    pub fn history(modified_by: FieldType, metadata: Vec<MetadataOption>) -> HistoryResult<Self> {
        let mut fields: BTreeMap<String, FieldType> = [
            ("action", FieldType::String),
            ("method", FieldType::String),
            ("modelName", FieldType::String),
            ("collectionName", FieldType::String),
            ("documentId", FieldType::ObjectId),
            ("changes", FieldType::Object),
            ("oldDocument", FieldType::Object),
            ("currentDocument", FieldType::Object),
            ("createdAt", FieldType::Date),
        ]
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .collect();
        fields.insert("modifiedBy".to_string(), modified_by);
        for option in &metadata {
            if RESERVED_FIELDS.contains(&option.key.as_str()) {
                return Err(HistoryError::ReservedMetadataKey(option.key.clone()));
            }
            let ty = option.schema.unwrap_or(FieldType::Mixed);
            if fields.insert(option.key.clone(), ty).is_some() {
                return Err(HistoryError::DuplicateMetadataKey(option.key.clone()));
            }
        }
        Ok(Self { fields, metadata })
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    pub fn metadata(&self) -> &[MetadataOption] {
        &self.metadata
    }

    /// Evaluate every metadata option against the event's snapshots.
    pub fn evaluate_metadata(&self, old: &Document, current: &Document) -> Document {
        self.metadata
            .iter()
            .map(|option| (option.key.clone(), option.value.evaluate(old, current)))
            .collect()
    }
}

/// A registered audit container. Cloning shares the same registration.
#[derive(Clone, Debug)]
pub struct ContainerHandle {
    name: String,
    shape: Arc<ContainerShape>,
    indexes: Arc<[IndexSpec]>,
}

impl ContainerHandle {
    pub fn new(name: impl Into<String>, shape: ContainerShape, indexes: Vec<IndexSpec>) -> Self {
        Self {
            name: name.into(),
            shape: Arc::new(shape),
            indexes: indexes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Arc<ContainerShape> {
        &self.shape
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    /// Returns `true` if both handles come from the same registration.
    pub fn same_registration(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.shape, &other.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_shape_has_standard_fields() {
        let shape = ContainerShape::history(FieldType::ObjectId, Vec::new()).unwrap();
        for field in [
            "action",
            "method",
            "modelName",
            "collectionName",
            "documentId",
            "modifiedBy",
            "changes",
            "oldDocument",
            "currentDocument",
            "createdAt",
        ] {
            assert!(shape.field_type(field).is_some(), "missing {field}");
        }
        assert_eq!(shape.field_type("modifiedBy"), Some(FieldType::ObjectId));
    }

    #[test]
    fn metadata_fields_join_shape() {
        let shape = ContainerShape::history(
            FieldType::String,
            vec![
                MetadataOption::fixed("tenant", "acme").with_schema(FieldType::String),
                MetadataOption::fixed("source", "api"),
            ],
        )
        .unwrap();
        assert_eq!(shape.field_type("tenant"), Some(FieldType::String));
        assert_eq!(shape.field_type("source"), Some(FieldType::Mixed));
        assert_eq!(shape.field_type("modifiedBy"), Some(FieldType::String));
    }

    #[test]
    fn metadata_evaluation() {
        let shape = ContainerShape::history(
            FieldType::ObjectId,
            vec![
                MetadataOption::fixed("tenant", "acme"),
                MetadataOption::computed("nameChanged", |old, current| {
                    Value::from(old.get("name") != current.get("name"))
                }),
            ],
        )
        .unwrap();
        let old = Document::from_json(json!({"name": "a"})).unwrap();
        let current = Document::from_json(json!({"name": "b"})).unwrap();
        let metadata = shape.evaluate_metadata(&old, &current);
        assert_eq!(metadata.get("tenant"), Some(&Value::from("acme")));
        assert_eq!(metadata.get("nameChanged"), Some(&Value::from(true)));
    }

    #[test]
    fn index_spec_deserializes_directions() {
        let raw = json!({"keys": {"documentId": 1, "createdAt": -1}, "unique": true});
        let spec: IndexSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(
            spec,
            IndexSpec::new()
                .ascending("documentId")
                .descending("createdAt")
                .unique()
        );
        assert!(serde_json::from_value::<IndexSpec>(json!({"keys": {"a": 2}})).is_err());
    }

    #[test]
    fn metadata_option_deserializes_static() {
        let option: MetadataOption =
            serde_json::from_value(json!({"key": "tenant", "value": "acme", "schema": "string"}))
                .unwrap();
        assert_eq!(option.schema, Some(FieldType::String));
        assert!(matches!(option.value, MetadataValue::Static(Value::String(ref s)) if s == "acme"));
        assert_eq!(format!("{:?}", MetadataValue::computed(|_, _| Value::Null)), "Computed(<fn>)");
    }

    #[test]
    fn handle_identity() {
        let a = ContainerHandle::new(
            "History",
            ContainerShape::history(FieldType::ObjectId, Vec::new()).unwrap(),
            vec![IndexSpec::new().ascending("documentId")],
        );
        let b = a.clone();
        let c = ContainerHandle::new(
            "History",
            ContainerShape::history(FieldType::ObjectId, Vec::new()).unwrap(),
            Vec::new(),
        );
        assert!(a.same_registration(&b));
        assert!(!a.same_registration(&c));
        assert_eq!(a.indexes().len(), 1);
    }

    #[test]
    fn metadata_cannot_shadow_event_fields() {
        for key in ["action", "changes", "createdAt", "documentId", "modifiedBy", "id"] {
            let err = ContainerShape::history(
                FieldType::ObjectId,
                vec![MetadataOption::fixed(key, "spoofed")],
            )
            .unwrap_err();
            assert_eq!(err, HistoryError::ReservedMetadataKey(key.to_string()));
        }
    }

    #[test]
    fn metadata_keys_are_unique() {
        let err = ContainerShape::history(
            FieldType::ObjectId,
            vec![
                MetadataOption::fixed("tenant", "a"),
                MetadataOption::fixed("tenant", "b"),
            ],
        )
        .unwrap_err();
        assert_eq!(err, HistoryError::DuplicateMetadataKey("tenant".into()));
    }
}
