//! Record types and their normalization strategies.
//!
//! Comparing a partial write payload against a full stored record would
//! report every field the payload never touched. Normalizing both sides
//! through the record type first (strip the identity, fill type defaults)
//! makes them the same shape.

use std::fmt;
use std::sync::Arc;

use doctrail_types::Document;

/// Turns a raw record into the comparable snapshot for its type.
///
/// Implementations must drop `_id` and should be pure.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: &Document) -> Document;
}

/// Strips the identity field and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityNormalizer;

impl Normalizer for IdentityNormalizer {
    fn normalize(&self, raw: &Document) -> Document {
        raw.without_id()
    }
}

/// Strips the identity field and fills top-level keys missing from the raw
/// record with the type's defaults.
#[derive(Clone, Debug, Default)]
pub struct DefaultsNormalizer {
    defaults: Document,
}

impl DefaultsNormalizer {
    pub fn new(defaults: Document) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &Document {
        &self.defaults
    }
}

impl Normalizer for DefaultsNormalizer {
    fn normalize(&self, raw: &Document) -> Document {
        let mut out = raw.without_id();
        for (key, value) in &self.defaults {
            if key != Document::ID_FIELD && !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
        out
    }
}

/// Adapts a closure into a [`Normalizer`]. The identity field is stripped
/// after the closure runs.
pub struct FnNormalizer<F>(pub F);

impl<F> Normalizer for FnNormalizer<F>
where
    F: Fn(&Document) -> Document + Send + Sync,
{
    fn normalize(&self, raw: &Document) -> Document {
        (self.0)(raw).without_id()
    }
}

/// Identity of a record type and the capability that normalizes it.
#[derive(Clone)]
pub struct ModelSchema {
    model_name: String,
    collection_name: String,
    timestamps: bool,
    normalizer: Arc<dyn Normalizer>,
}

impl ModelSchema {
    /// A schema with the default collection name (lowercased model name,
    /// pluralized with a trailing `s`) and no defaults.
    pub fn new(model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let collection_name = default_collection_name(&model_name);
        Self {
            model_name,
            collection_name,
            timestamps: false,
            normalizer: Arc::new(IdentityNormalizer),
        }
    }

    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Maintain `createdAt` / `updatedAt` on every write.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Use a [`DefaultsNormalizer`] built from `defaults`.
    pub fn with_defaults(self, defaults: Document) -> Self {
        self.with_normalizer(DefaultsNormalizer::new(defaults))
    }

    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    /// Normalize a raw record for comparison.
    pub fn normalize(&self, raw: &Document) -> Document {
        self.normalizer.normalize(raw)
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("model_name", &self.model_name)
            .field("collection_name", &self.collection_name)
            .field("timestamps", &self.timestamps)
            .finish_non_exhaustive()
    }
}

fn default_collection_name(model_name: &str) -> String {
    let lower = model_name.to_lowercase();
    if lower.ends_with('s') {
        lower
    } else {
        format!("{lower}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctrail_types::{DocumentId, Value};
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    #[test]
    fn default_collection_names() {
        assert_eq!(ModelSchema::new("User").collection_name(), "users");
        assert_eq!(ModelSchema::new("Address").collection_name(), "address");
        assert_eq!(
            ModelSchema::new("User").with_collection_name("people").collection_name(),
            "people"
        );
    }

    #[test]
    fn identity_normalizer_strips_id() {
        let mut raw = doc(json!({"name": "a"}));
        raw.set_id(DocumentId::new());
        let normalized = ModelSchema::new("User").normalize(&raw);
        assert_eq!(normalized, doc(json!({"name": "a"})));
    }

    #[test]
    fn defaults_fill_missing_keys_only() {
        let schema = ModelSchema::new("User").with_defaults(doc(json!({
            "role": "member",
            "active": true,
        })));
        let normalized = schema.normalize(&doc(json!({"name": "a", "role": "admin"})));
        assert_eq!(
            normalized,
            doc(json!({"name": "a", "role": "admin", "active": true}))
        );
    }

    #[test]
    fn defaults_keep_explicit_null() {
        let schema = ModelSchema::new("User").with_defaults(doc(json!({"role": "member"})));
        let normalized = schema.normalize(&doc(json!({"role": null})));
        assert_eq!(normalized.get("role"), Some(&Value::Null));
    }

    #[test]
    fn fn_normalizer_still_strips_id() {
        let schema = ModelSchema::new("User").with_normalizer(FnNormalizer(|raw: &Document| {
            let mut out = raw.clone();
            out.insert("computed", 1);
            out
        }));
        let mut raw = doc(json!({"a": 1}));
        raw.set_id(DocumentId::new());
        let normalized = schema.normalize(&raw);
        assert!(normalized.id().is_none());
        assert_eq!(normalized.get("computed"), Some(&Value::from(1)));
    }

    #[test]
    fn debug_hides_normalizer() {
        let debug = format!("{:?}", ModelSchema::new("User"));
        assert!(debug.contains("ModelSchema"));
        assert!(debug.contains("users"));
    }
}
