use std::collections::BTreeSet;

use serde::Deserialize;

use doctrail_diff::DiffOptions;
use doctrail_history::{ContainerShape, FieldType, IndexSpec, MetadataOption};

use crate::error::{RecorderError, RecorderResult};

/// Container name used when no custom name is configured.
pub const DEFAULT_CONTAINER_NAME: &str = "History";

/// Context key the actor identity is read from by default.
pub const DEFAULT_CONTEXT_PATH: &str = "request:userInfo";

/// How the acting user is resolved and typed.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModifiedByOptions {
    /// Storage type of the `modifiedBy` field.
    pub schema_type: FieldType,
    /// Key looked up in the request context for each write.
    pub context_path: String,
}

impl Default for ModifiedByOptions {
    fn default() -> Self {
        Self {
            schema_type: FieldType::ObjectId,
            context_path: DEFAULT_CONTEXT_PATH.to_string(),
        }
    }
}

/// Auditing policy for one model.
///
/// Every field is optional in configuration text:
///
/// ```toml
/// diff_only = true
/// custom_collection_name = "AuditTrail"
/// omit_paths = ["lastLogin"]
///
/// [[indexes]]
/// keys = { documentId = 1, createdAt = -1 }
///
/// [modified_by]
/// context_path = "request:actor"
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryOptions {
    /// Drop the full before/after snapshots and keep only the diff.
    pub diff_only: bool,
    pub custom_collection_name: Option<String>,
    /// Passed through to the history store when the container is registered.
    pub indexes: Vec<IndexSpec>,
    /// Extra top-level keys excluded from diffing.
    pub omit_paths: BTreeSet<String>,
    /// Report keys missing from the current snapshot as `{new: null, old}`.
    pub keep_new_keys: bool,
    pub metadata: Vec<MetadataOption>,
    pub modified_by: ModifiedByOptions,
    /// Record one event per matched record for bulk updates and deletes.
    /// When off, bulk writes are logged and otherwise left unaudited.
    pub audit_bulk_operations: bool,
}

impl HistoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML text. Metadata keys are checked against the
    /// container layout before the options are returned.
    pub fn from_toml_str(text: &str) -> RecorderResult<Self> {
        let options: Self =
            toml::from_str(text).map_err(|e| RecorderError::Config(e.to_string()))?;
        options
            .container_shape()
            .map_err(|e| RecorderError::Config(e.to_string()))?;
        Ok(options)
    }

    /// Name of the audit container.
    pub fn container_name(&self) -> &str {
        self.custom_collection_name
            .as_deref()
            .unwrap_or(DEFAULT_CONTAINER_NAME)
    }

    /// Diff policy for creations and updates.
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions::new()
            .with_omit_paths(self.omit_paths.iter().cloned())
            .keep_new_keys(self.keep_new_keys)
    }

    /// Diff policy for deletions. The current snapshot of a deletion is
    /// empty, so every removed key must be reported.
    pub fn deletion_diff_options(&self) -> DiffOptions {
        self.diff_options().keep_new_keys(true)
    }

    /// Field layout of the audit container. Fails if a metadata key clashes
    /// with a standard event field or with another metadata key.
    pub fn container_shape(&self) -> RecorderResult<ContainerShape> {
        let shape = ContainerShape::history(self.modified_by.schema_type, self.metadata.clone())?;
        Ok(shape)
    }

    pub fn with_diff_only(mut self, diff_only: bool) -> Self {
        self.diff_only = diff_only;
        self
    }

    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.custom_collection_name = Some(name.into());
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn omit(mut self, path: impl Into<String>) -> Self {
        self.omit_paths.insert(path.into());
        self
    }

    pub fn with_keep_new_keys(mut self, keep: bool) -> Self {
        self.keep_new_keys = keep;
        self
    }

    pub fn with_metadata(mut self, option: MetadataOption) -> Self {
        self.metadata.push(option);
        self
    }

    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.modified_by.context_path = path.into();
        self
    }

    pub fn with_bulk_audit(mut self, enabled: bool) -> Self {
        self.audit_bulk_operations = enabled;
        self
    }
}
