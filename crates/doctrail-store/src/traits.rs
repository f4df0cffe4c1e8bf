use async_trait::async_trait;

use doctrail_types::{Document, DocumentId};

use crate::error::StoreResult;
use crate::query::Filter;

/// Collection-oriented record store.
///
/// All implementations must satisfy these invariants:
/// - A missing record is `Ok(None)` / `Ok(false)`, never an error.
/// - Every stored record carries a [`DocumentId`] under `_id`.
/// - Results of `find_many` come back in insertion order.
/// - The store never interprets record contents beyond `Filter` matching.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// First record in `collection` matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Every record in `collection` matching `filter`.
    async fn find_many(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Insert a record, assigning an identity when it has none.
    ///
    /// Returns the stored record. Fails with `DuplicateId` if the identity
    /// is already taken.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Overwrite the record with `document`'s identity. Returns `true` if it
    /// existed.
    async fn replace(&self, collection: &str, document: Document) -> StoreResult<bool>;

    /// Remove a record by identity. Returns `true` if it existed.
    async fn delete(&self, collection: &str, id: DocumentId) -> StoreResult<bool>;

    /// Read a record by identity.
    ///
    /// Default implementation goes through `find_one`. Backends with a
    /// primary-key lookup may override it.
    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        self.find_one(collection, &Filter::by_id(id)).await
    }
}
