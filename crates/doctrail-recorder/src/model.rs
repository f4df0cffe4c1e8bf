//! Data-access handle that fires write hooks around a [`RecordStore`].

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use doctrail_history::WriteMethod;
use doctrail_store::{Filter, ModelSchema, RecordStore, Update};
use doctrail_types::{Document, DocumentId, Value};

use crate::error::RecorderResult;
use crate::hooks::WriteHook;

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Reads and writes the records of one [`ModelSchema`].
///
/// Every write runs the registered hooks at its lifecycle point first; a
/// hook error aborts the write before the store is touched (except for
/// `insert_many`, whose hook runs after the insert).
pub struct Model {
    schema: ModelSchema,
    store: Arc<dyn RecordStore>,
    hooks: Vec<Arc<dyn WriteHook>>,
}

impl Model {
    pub fn new(schema: ModelSchema, store: Arc<dyn RecordStore>) -> Self {
        Self {
            schema,
            store,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn WriteHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn collection(&self) -> &str {
        self.schema.collection_name()
    }

    /// Insert a new record, assigning an identity if it has none.
    pub async fn create(&self, mut document: Document) -> RecorderResult<Document> {
        if document.id().is_none() {
            document.set_id(DocumentId::new());
        }
        self.stamp_new(&mut document);
        for hook in &self.hooks {
            hook.pre_save(&self.schema, &document, true).await?;
        }
        Ok(self.store.insert(self.collection(), document).await?)
    }

    /// Persist `document`: an update if a record with its identity exists,
    /// a creation otherwise.
    pub async fn save(&self, mut document: Document) -> RecorderResult<Document> {
        let existing = match document.id() {
            Some(id) => self.store.find_by_id(self.collection(), id).await?,
            None => None,
        };
        let Some(existing) = existing else {
            return self.create(document).await;
        };

        if self.schema.timestamps() {
            if let Some(created) = existing.get(CREATED_AT) {
                document.insert(CREATED_AT, created.clone());
            }
            document.insert(UPDATED_AT, now());
        }
        for hook in &self.hooks {
            hook.pre_save(&self.schema, &document, false).await?;
        }
        if !self.store.replace(self.collection(), document.clone()).await? {
            debug!(model = self.schema.model_name(), "record vanished during save");
        }
        Ok(document)
    }

    /// Insert every document, then fire the bulk-insert hooks once with the
    /// stored records.
    pub async fn insert_many(&self, documents: Vec<Document>) -> RecorderResult<Vec<Document>> {
        let mut inserted = Vec::with_capacity(documents.len());
        for mut document in documents {
            self.stamp_new(&mut document);
            inserted.push(self.store.insert(self.collection(), document).await?);
        }
        for hook in &self.hooks {
            hook.post_insert_many(&self.schema, &inserted).await?;
        }
        Ok(inserted)
    }

    /// Apply `update` to the first record matching `filter`. Returns `true`
    /// if a record matched.
    pub async fn update_one(&self, filter: &Filter, update: Update) -> RecorderResult<bool> {
        let updated = self.update_single(WriteMethod::UpdateOne, filter, update).await?;
        Ok(updated.is_some())
    }

    /// Apply `update` to the first record matching `filter` and return the
    /// record as it is after the update.
    pub async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: Update,
    ) -> RecorderResult<Option<Document>> {
        self.update_single(WriteMethod::FindOneAndUpdate, filter, update)
            .await
    }

    pub async fn find_by_id_and_update(
        &self,
        id: DocumentId,
        update: Update,
    ) -> RecorderResult<Option<Document>> {
        self.update_single(WriteMethod::FindByIdAndUpdate, &Filter::by_id(id), update)
            .await
    }

    /// Swap the body of the first record matching `filter`, keeping its
    /// identity.
    pub async fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
    ) -> RecorderResult<bool> {
        let update = Update::replace(replacement);
        let replaced = self.update_single(WriteMethod::ReplaceOne, filter, update).await?;
        Ok(replaced.is_some())
    }

    pub async fn find_one_and_replace(
        &self,
        filter: &Filter,
        replacement: Document,
    ) -> RecorderResult<Option<Document>> {
        let update = Update::replace(replacement);
        self.update_single(WriteMethod::FindOneAndReplace, filter, update)
            .await
    }

    /// Delete the first record matching `filter`. Returns `true` if one was
    /// removed.
    pub async fn delete_one(&self, filter: &Filter) -> RecorderResult<bool> {
        let deleted = self.delete_single(WriteMethod::DeleteOne, filter).await?;
        Ok(deleted.is_some())
    }

    /// Delete the first record matching `filter` and return it.
    pub async fn find_one_and_delete(&self, filter: &Filter) -> RecorderResult<Option<Document>> {
        self.delete_single(WriteMethod::FindOneAndDelete, filter)
            .await
    }

    pub async fn find_by_id_and_delete(&self, id: DocumentId) -> RecorderResult<Option<Document>> {
        self.delete_single(WriteMethod::FindByIdAndDelete, &Filter::by_id(id))
            .await
    }

    /// Delete every record matching `filter`. Returns how many were removed.
    pub async fn delete_many(&self, filter: &Filter) -> RecorderResult<usize> {
        for hook in &self.hooks {
            hook.pre_delete_many(&self.schema, filter).await?;
        }
        let mut removed = 0;
        for record in self.store.find_many(self.collection(), filter).await? {
            if let Some(id) = record.id() {
                if self.store.delete(self.collection(), id).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Apply `update` to every record matching `filter`. Returns how many
    /// were modified.
    pub async fn update_many(&self, filter: &Filter, update: Update) -> RecorderResult<usize> {
        let update = self.stamp_update(update);
        for hook in &self.hooks {
            hook.pre_update_many(&self.schema, filter, &update).await?;
        }
        let mut modified = 0;
        for record in self.store.find_many(self.collection(), filter).await? {
            let updated = self.apply(&record, &update);
            if self.store.replace(self.collection(), updated).await? {
                modified += 1;
            }
        }
        Ok(modified)
    }

    pub async fn find_one(&self, filter: &Filter) -> RecorderResult<Option<Document>> {
        Ok(self.store.find_one(self.collection(), filter).await?)
    }

    pub async fn find_by_id(&self, id: DocumentId) -> RecorderResult<Option<Document>> {
        Ok(self.store.find_by_id(self.collection(), id).await?)
    }

    pub async fn find(&self, filter: &Filter) -> RecorderResult<Vec<Document>> {
        Ok(self.store.find_many(self.collection(), filter).await?)
    }

    async fn update_single(
        &self,
        method: WriteMethod,
        filter: &Filter,
        update: Update,
    ) -> RecorderResult<Option<Document>> {
        let update = self.stamp_update(update);
        for hook in &self.hooks {
            hook.pre_update_one(&self.schema, method, filter, &update).await?;
        }
        let Some(target) = self.store.find_one(self.collection(), filter).await? else {
            return Ok(None);
        };
        let updated = self.apply(&target, &update);
        if !self.store.replace(self.collection(), updated.clone()).await? {
            return Ok(None);
        }
        Ok(Some(updated))
    }

    async fn delete_single(
        &self,
        method: WriteMethod,
        filter: &Filter,
    ) -> RecorderResult<Option<Document>> {
        for hook in &self.hooks {
            hook.pre_delete_one(&self.schema, method, filter).await?;
        }
        let Some(target) = self.store.find_one(self.collection(), filter).await? else {
            return Ok(None);
        };
        let Some(id) = target.id() else {
            return Ok(None);
        };
        if !self.store.delete(self.collection(), id).await? {
            return Ok(None);
        }
        Ok(Some(target))
    }

    fn stamp_new(&self, document: &mut Document) {
        if self.schema.timestamps() {
            let now = now();
            document.insert(CREATED_AT, now.clone());
            document.insert(UPDATED_AT, now);
        }
    }

    fn stamp_update(&self, update: Update) -> Update {
        if self.schema.timestamps() {
            update.and_set(UPDATED_AT, now())
        } else {
            update
        }
    }

    fn apply(&self, target: &Document, update: &Update) -> Document {
        let mut updated = update.apply(target);
        if self.schema.timestamps() && !updated.contains_key(CREATED_AT) {
            if let Some(created) = target.get(CREATED_AT) {
                updated.insert(CREATED_AT, created.clone());
            }
        }
        updated
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("schema", &self.schema)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

fn now() -> Value {
    Value::from(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doctrail_history::{
        ChangeAction, ChangeEvent, ContainerHandle, ContainerShape, HistoryError, HistoryRecord,
        HistoryResult, HistoryStore, InMemoryHistoryStore, IndexSpec,
    };
    use doctrail_store::InMemoryRecordStore;
    use serde_json::json;

    use crate::actor::{with_request_context, ActorContext, NoActorContext, TaskLocalActorContext};
    use crate::config::HistoryOptions;
    use crate::error::RecorderError;
    use crate::hooks::{HistoryHook, NoOpHook};
    use crate::recorder::ChangeRecorder;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    struct Audited {
        users: Model,
        records: Arc<InMemoryRecordStore>,
        history: Arc<InMemoryHistoryStore>,
        recorder: Arc<ChangeRecorder>,
    }

    fn audited_with(
        options: HistoryOptions,
        schema: ModelSchema,
        actor: Arc<dyn ActorContext>,
    ) -> Audited {
        let records = Arc::new(InMemoryRecordStore::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let recorder = Arc::new(ChangeRecorder::new(options, history.clone()));
        let hook = HistoryHook::new(recorder.clone(), records.clone(), actor);
        let users = Model::new(schema, records.clone()).with_hook(Arc::new(hook));
        Audited {
            users,
            records,
            history,
            recorder,
        }
    }

    fn audited(options: HistoryOptions) -> Audited {
        audited_with(options, ModelSchema::new("User"), Arc::new(NoActorContext))
    }

    impl Audited {
        async fn events(&self) -> Vec<ChangeEvent> {
            match self.history.records(self.recorder.options().container_name()).await {
                Ok(records) => records.into_iter().map(|r| r.event).collect(),
                Err(_) => Vec::new(),
            }
        }
    }

    #[tokio::test]
    async fn create_emits_one_created_event() {
        let a = audited(HistoryOptions::default());
        let user = a.users.create(doc(json!({"name": "John", "age": 30}))).await.unwrap();

        let events = a.events().await;
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.action, ChangeAction::Created);
        assert_eq!(event.method, WriteMethod::Save);
        assert_eq!(event.model_name, "User");
        assert_eq!(event.collection_name, "users");
        assert_eq!(event.document_id, user.id());
        assert_eq!(event.old_document, Some(Document::new()));
        assert_eq!(event.current_document, Some(doc(json!({"name": "John", "age": 30}))));
    }

    #[tokio::test]
    async fn identical_update_emits_nothing() {
        let a = audited(HistoryOptions::default());
        let user = a.users.create(doc(json!({"name": "John"}))).await.unwrap();
        let id = user.id().unwrap();

        a.users.save(user).await.unwrap();
        a.users
            .update_one(&Filter::by_id(id), Update::set("name", "John"))
            .await
            .unwrap();
        assert_eq!(a.events().await.len(), 1);
    }

    #[tokio::test]
    async fn single_field_update_emits_that_leaf() {
        let a = audited(HistoryOptions::default());
        let user = a
            .users
            .create(doc(json!({"name": "John", "age": 30, "tags": ["a"]})))
            .await
            .unwrap();
        let id = user.id().unwrap();

        let updated = a
            .users
            .find_by_id_and_update(id, Update::set("age", 31))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("age"), Some(&Value::from(31)));

        let events = a.events().await;
        assert_eq!(events.len(), 2);
        let event = &events[1];
        assert_eq!(event.action, ChangeAction::Updated);
        assert_eq!(event.method, WriteMethod::FindByIdAndUpdate);
        assert_eq!(event.document_id, Some(id));
        assert_eq!(event.changes.to_json(), json!({"age": {"new": 31, "old": 30}}));
    }

    #[tokio::test]
    async fn save_of_existing_record_is_an_update() {
        let a = audited(HistoryOptions::default());
        let mut user = a.users.create(doc(json!({"name": "John"}))).await.unwrap();
        user.insert("name", "Jane");
        a.users.save(user).await.unwrap();

        let events = a.events().await;
        assert_eq!(events[1].action, ChangeAction::Updated);
        assert_eq!(events[1].changes.paths(), vec!["name"]);
    }

    #[tokio::test]
    async fn delete_of_already_removed_record_is_silent() {
        let a = audited(HistoryOptions::default());
        let user = a.users.create(doc(json!({"name": "John"}))).await.unwrap();
        let id = user.id().unwrap();

        // Removed behind the model's back.
        a.records.delete("users", id).await.unwrap();

        assert!(a.users.find_by_id_and_delete(id).await.unwrap().is_none());
        assert!(!a.users.delete_one(&Filter::by_id(id)).await.unwrap());
        assert_eq!(a.events().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_records_removed_fields() {
        let a = audited(HistoryOptions::default());
        let user = a.users.create(doc(json!({"name": "John"}))).await.unwrap();
        let removed = a
            .users
            .find_one_and_delete(&Filter::all().eq("name", "John"))
            .await
            .unwrap();
        assert_eq!(removed.as_ref().and_then(Document::id), user.id());

        let events = a.events().await;
        assert_eq!(events[1].action, ChangeAction::Deleted);
        assert_eq!(events[1].method, WriteMethod::FindOneAndDelete);
        assert_eq!(events[1].current_document, Some(Document::new()));
        assert_eq!(events[1].changes.to_json(), json!({"name": {"new": null, "old": "John"}}));
    }

    #[tokio::test]
    async fn replace_reports_removed_keys_when_tracking() {
        let a = audited(HistoryOptions::default().with_keep_new_keys(true));
        let user = a.users.create(doc(json!({"name": "John", "age": 30}))).await.unwrap();
        let id = user.id().unwrap();

        assert!(a
            .users
            .replace_one(&Filter::by_id(id), doc(json!({"name": "John"})))
            .await
            .unwrap());
        let stored = a.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.get("age"), None);

        let events = a.events().await;
        assert_eq!(events[1].method, WriteMethod::ReplaceOne);
        assert_eq!(events[1].changes.to_json(), json!({"age": {"new": null, "old": 30}}));
    }

    #[tokio::test]
    async fn unset_only_update_is_recorded() {
        let a = audited(HistoryOptions::default());
        let user = a
            .users
            .create(doc(json!({"name": "John", "email": "john@example.com"})))
            .await
            .unwrap();
        let id = user.id().unwrap();

        a.users
            .update_one(&Filter::by_id(id), Update::unset("email"))
            .await
            .unwrap();
        let stored = a.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.get("email"), None);

        let events = a.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].action, ChangeAction::Updated);
        assert_eq!(
            events[1].changes.to_json(),
            json!({"email": {"new": null, "old": "john@example.com"}})
        );
        let current = events[1].current_document.as_ref().unwrap();
        assert_eq!(current.get("email"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn bulk_operations_follow_flag() {
        let a = audited(HistoryOptions::default());
        a.users
            .insert_many(vec![doc(json!({"n": 1})), doc(json!({"n": 2}))])
            .await
            .unwrap();
        assert_eq!(a.users.update_many(&Filter::all(), Update::set("n", 0)).await.unwrap(), 2);
        assert_eq!(a.users.delete_many(&Filter::all()).await.unwrap(), 2);

        let methods: Vec<WriteMethod> = a.events().await.iter().map(|e| e.method).collect();
        assert_eq!(methods, vec![WriteMethod::InsertMany, WriteMethod::InsertMany]);

        let a = audited(HistoryOptions::default().with_bulk_audit(true));
        a.users
            .insert_many(vec![doc(json!({"n": 1})), doc(json!({"n": 2}))])
            .await
            .unwrap();
        a.users.update_many(&Filter::all(), Update::set("n", 0)).await.unwrap();
        a.users.delete_many(&Filter::all()).await.unwrap();

        let actions: Vec<ChangeAction> = a.events().await.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ChangeAction::Created,
                ChangeAction::Created,
                ChangeAction::Updated,
                ChangeAction::Updated,
                ChangeAction::Deleted,
                ChangeAction::Deleted,
            ]
        );
    }

    #[tokio::test]
    async fn diff_only_keeps_changes_only() {
        let a = audited(HistoryOptions::default().with_diff_only(true));
        a.users.create(doc(json!({"name": "John"}))).await.unwrap();
        let events = a.events().await;
        assert!(events[0].is_diff_only());
        assert_eq!(events[0].changes.paths(), vec!["name"]);
    }

    #[tokio::test]
    async fn timestamps_do_not_count_as_changes() {
        let schema = ModelSchema::new("User").with_timestamps(true);
        let a = audited_with(HistoryOptions::default(), schema, Arc::new(NoActorContext));
        let user = a.users.create(doc(json!({"name": "John"}))).await.unwrap();
        assert!(user.get("createdAt").and_then(Value::as_date).is_some());
        let id = user.id().unwrap();

        let updated = a
            .users
            .find_one_and_replace(&Filter::by_id(id), doc(json!({"name": "John"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("createdAt"), user.get("createdAt"));
        assert!(updated.get("updatedAt").is_some());
        assert_eq!(a.events().await.len(), 1);
    }

    #[tokio::test]
    async fn actor_resolved_per_request() {
        let a = Arc::new(audited_with(
            HistoryOptions::default(),
            ModelSchema::new("User"),
            Arc::new(TaskLocalActorContext),
        ));

        let mut handles = Vec::new();
        for n in 0..4 {
            let a = a.clone();
            let actor = format!("user-{n}");
            let mut ctx = Document::new();
            ctx.insert("request:userInfo", actor.clone());
            handles.push(tokio::spawn(with_request_context(ctx, async move {
                tokio::task::yield_now().await;
                a.users.create(doc(json!({ "owner": actor }))).await.unwrap();
            })));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let events = a.events().await;
        assert_eq!(events.len(), 4);
        for event in events {
            let owner = event.current_document.as_ref().and_then(|d| d.get("owner")).cloned();
            assert_eq!(event.modified_by, owner);
        }

        // Outside any request there is no actor.
        a.users.create(doc(json!({"owner": "nobody"}))).await.unwrap();
        assert_eq!(a.events().await[4].modified_by, None);
    }

    #[tokio::test]
    async fn clear_history_empties_model_trail() {
        let a = audited(HistoryOptions::default());
        a.users.create(doc(json!({"name": "a"}))).await.unwrap();
        a.users.create(doc(json!({"name": "b"}))).await.unwrap();
        assert_eq!(a.recorder.clear_history("User").await.unwrap(), 2);
        assert!(a.events().await.is_empty());
    }

    struct FailingHistoryStore;

    #[async_trait]
    impl HistoryStore for FailingHistoryStore {
        async fn register_container(
            &self,
            name: &str,
            shape: ContainerShape,
            indexes: &[IndexSpec],
        ) -> HistoryResult<ContainerHandle> {
            Ok(ContainerHandle::new(name, shape, indexes.to_vec()))
        }

        async fn persist(
            &self,
            _container: &ContainerHandle,
            _event: &ChangeEvent,
        ) -> HistoryResult<()> {
            Err(HistoryError::Backend("connection reset".into()))
        }

        async fn records(&self, _container: &str) -> HistoryResult<Vec<HistoryRecord>> {
            Ok(Vec::new())
        }

        async fn clear_model(&self, _container: &str, _model: &str) -> HistoryResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn persistence_failure_aborts_write() {
        let records = Arc::new(InMemoryRecordStore::new());
        let recorder = Arc::new(ChangeRecorder::new(
            HistoryOptions::default(),
            Arc::new(FailingHistoryStore),
        ));
        let hook = HistoryHook::new(recorder, records.clone(), Arc::new(NoActorContext));
        let users = Model::new(ModelSchema::new("User"), records.clone()).with_hook(Arc::new(hook));

        let err = users.create(doc(json!({"name": "John"}))).await.unwrap_err();
        assert_eq!(
            err,
            RecorderError::History(HistoryError::Backend("connection reset".into()))
        );
        assert_eq!(records.count("users").unwrap(), 0);
    }

    #[tokio::test]
    async fn unhooked_model_is_plain_crud() {
        let records = Arc::new(InMemoryRecordStore::new());
        let users = Model::new(ModelSchema::new("User"), records).with_hook(Arc::new(NoOpHook));

        let user = users.create(doc(json!({"name": "a"}))).await.unwrap();
        let id = user.id().unwrap();
        assert_eq!(users.find(&Filter::all()).await.unwrap().len(), 1);
        assert!(users.find_one(&Filter::all().eq("name", "a")).await.unwrap().is_some());
        assert!(users.update_one(&Filter::by_id(id), Update::unset("name")).await.unwrap());
        assert_eq!(users.find_by_id(id).await.unwrap().unwrap().get("name"), None);
        assert!(users
            .find_one_and_update(&Filter::all().eq("name", "ghost"), Update::set("x", 1))
            .await
            .unwrap()
            .is_none());
        assert!(users.delete_one(&Filter::by_id(id)).await.unwrap());
    }
}
