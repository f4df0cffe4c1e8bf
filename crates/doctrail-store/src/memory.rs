use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use doctrail_types::{Document, DocumentId};

use crate::error::{StoreError, StoreResult};
use crate::query::Filter;
use crate::traits::RecordStore;

type Collections = HashMap<String, Collection>;

/// Records of one collection, iterated in insertion order.
#[derive(Default)]
struct Collection {
    order: Vec<DocumentId>,
    records: HashMap<DocumentId, Document>,
}

impl Collection {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.records.get(id)
    }

    fn values(&self) -> impl Iterator<Item = &Document> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    fn insert(&mut self, id: DocumentId, document: Document) {
        if self.records.insert(id, document).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let removed = self.records.remove(id)?;
        self.order.retain(|other| other != id);
        Some(removed)
    }
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. Collections are created on first
/// insert. Records are cloned on read and write.
pub struct InMemoryRecordStore {
    collections: RwLock<Collections>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records in `collection`.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.read()?.get(collection).map_or(0, Collection::len))
    }

    /// Names of every collection that has received a record, sorted.
    pub fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("record store read"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("record store write"))
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let collections = self.read()?;
        let Some(records) = collections.get(collection) else {
            return Ok(None);
        };
        if let Some(id) = filter.target_id() {
            return Ok(records.get(&id).filter(|r| filter.matches(r)).cloned());
        }
        let found = records.values().find(|r| filter.matches(r)).cloned();
        Ok(found)
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        let matched = collections
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(matched)
    }

    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        let id = match document.id() {
            Some(id) => id,
            None => {
                let id = DocumentId::new();
                document.set_id(id);
                id
            }
        };

        let mut collections = self.write()?;
        let records = collections.entry(collection.to_string()).or_default();
        if records.get(&id).is_some() {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        records.insert(id, document.clone());
        debug!(collection, id = %id, "inserted record");
        Ok(document)
    }

    async fn replace(&self, collection: &str, document: Document) -> StoreResult<bool> {
        let Some(id) = document.id() else {
            return Ok(false);
        };
        let mut collections = self.write()?;
        let Some(slot) = collections
            .get_mut(collection)
            .and_then(|records| records.records.get_mut(&id))
        else {
            return Ok(false);
        };
        *slot = document;
        debug!(collection, id = %id, "replaced record");
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> StoreResult<bool> {
        let mut collections = self.write()?;
        let removed = collections
            .get_mut(collection)
            .and_then(|records| records.remove(&id))
            .is_some();
        if removed {
            debug!(collection, id = %id, "deleted record");
        }
        Ok(removed)
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|records| records.get(&id))
            .cloned())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.collection_names().map(|n| n.len()).unwrap_or(0);
        f.debug_struct("InMemoryRecordStore")
            .field("collection_count", &collections)
            .finish()
    }
}
