use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use doctrail_history::WriteMethod;
use doctrail_store::{Filter, ModelSchema, RecordStore, Update};
use doctrail_types::{Document, Value};

use crate::actor::ActorContext;
use crate::error::RecorderResult;
use crate::operation::{OperationKind, RecordContext};
use crate::recorder::ChangeRecorder;

/// Callbacks fired by a [`Model`](crate::Model) around each write.
///
/// `pre_*` hooks run before the store is touched and see the record as it
/// is. An error aborts the write.
#[async_trait]
pub trait WriteHook: Send + Sync {
    /// A single record is about to be saved. `is_new` is `true` when the
    /// record does not exist yet.
    async fn pre_save(
        &self,
        schema: &ModelSchema,
        document: &Document,
        is_new: bool,
    ) -> RecorderResult<()>;

    /// At most one record matching `filter` is about to be deleted.
    async fn pre_delete_one(
        &self,
        schema: &ModelSchema,
        method: WriteMethod,
        filter: &Filter,
    ) -> RecorderResult<()>;

    /// Every record matching `filter` is about to be deleted.
    async fn pre_delete_many(&self, schema: &ModelSchema, filter: &Filter) -> RecorderResult<()>;

    /// `documents` were just inserted in bulk.
    async fn post_insert_many(
        &self,
        schema: &ModelSchema,
        documents: &[Document],
    ) -> RecorderResult<()>;

    /// The first record matching `filter` is about to receive `update`.
    async fn pre_update_one(
        &self,
        schema: &ModelSchema,
        method: WriteMethod,
        filter: &Filter,
        update: &Update,
    ) -> RecorderResult<()>;

    /// Every record matching `filter` is about to receive `update`.
    async fn pre_update_many(
        &self,
        schema: &ModelSchema,
        filter: &Filter,
        update: &Update,
    ) -> RecorderResult<()>;
}

/// Hook that does nothing.
pub struct NoOpHook;

#[async_trait]
impl WriteHook for NoOpHook {
    async fn pre_save(
        &self,
        _schema: &ModelSchema,
        _document: &Document,
        _is_new: bool,
    ) -> RecorderResult<()> {
        Ok(())
    }

    async fn pre_delete_one(
        &self,
        _schema: &ModelSchema,
        _method: WriteMethod,
        _filter: &Filter,
    ) -> RecorderResult<()> {
        Ok(())
    }

    async fn pre_delete_many(&self, _schema: &ModelSchema, _filter: &Filter) -> RecorderResult<()> {
        Ok(())
    }

    async fn post_insert_many(
        &self,
        _schema: &ModelSchema,
        _documents: &[Document],
    ) -> RecorderResult<()> {
        Ok(())
    }

    async fn pre_update_one(
        &self,
        _schema: &ModelSchema,
        _method: WriteMethod,
        _filter: &Filter,
        _update: &Update,
    ) -> RecorderResult<()> {
        Ok(())
    }

    async fn pre_update_many(
        &self,
        _schema: &ModelSchema,
        _filter: &Filter,
        _update: &Update,
    ) -> RecorderResult<()> {
        Ok(())
    }
}

/// Hook that records a [`ChangeEvent`](doctrail_history::ChangeEvent) for
/// every qualifying write.
///
/// Prior state is read from `store`, both snapshots are normalized through
/// the schema, and the actor is resolved once per write from `actor`.
pub struct HistoryHook {
    recorder: Arc<ChangeRecorder>,
    store: Arc<dyn RecordStore>,
    actor: Arc<dyn ActorContext>,
}

impl HistoryHook {
    pub fn new(
        recorder: Arc<ChangeRecorder>,
        store: Arc<dyn RecordStore>,
        actor: Arc<dyn ActorContext>,
    ) -> Self {
        Self {
            recorder,
            store,
            actor,
        }
    }

    pub fn recorder(&self) -> &Arc<ChangeRecorder> {
        &self.recorder
    }

    fn resolve_actor(&self) -> Option<Value> {
        self.actor.get(&self.recorder.options().modified_by.context_path)
    }

    fn bulk_enabled(&self, schema: &ModelSchema, method: WriteMethod) -> bool {
        let enabled = self.recorder.options().audit_bulk_operations;
        if !enabled {
            info!(
                model = schema.model_name(),
                method = %method,
                "bulk write observed, not audited"
            );
        }
        enabled
    }

    /// Record one targeted or bulk update of `raw`.
    async fn record_update(
        &self,
        schema: &ModelSchema,
        kind: OperationKind,
        method: WriteMethod,
        raw: Option<Document>,
        update: &Update,
        actor: Option<Value>,
    ) -> RecorderResult<()> {
        let ctx = RecordContext::new(kind, method, schema).with_actor(actor);
        let ctx = match raw {
            Some(raw) => ctx
                .with_document_id(raw.id())
                .with_current(updated_snapshot(schema, &raw, update))
                .with_old(Some(schema.normalize(&raw))),
            None => ctx,
        };
        self.recorder.record_change(ctx).await?;
        Ok(())
    }

    async fn record_delete(
        &self,
        schema: &ModelSchema,
        kind: OperationKind,
        method: WriteMethod,
        raw: Option<Document>,
        actor: Option<Value>,
    ) -> RecorderResult<()> {
        let ctx = RecordContext::new(kind, method, schema)
            .with_document_id(raw.as_ref().and_then(Document::id))
            .with_old(raw.map(|raw| schema.normalize(&raw)))
            .with_actor(actor);
        self.recorder.record_change(ctx).await?;
        Ok(())
    }
}

/// The normalized record after `update`. Unset fields stay in the snapshot
/// as explicit nulls so the removal shows up in the diff.
fn updated_snapshot(schema: &ModelSchema, raw: &Document, update: &Update) -> Document {
    let mut current = schema.normalize(&update.apply(raw));
    for field in update.unset_fields() {
        if current.get(field).is_none() {
            current.insert(field, Value::Null);
        }
    }
    current
}

#[async_trait]
impl WriteHook for HistoryHook {
    async fn pre_save(
        &self,
        schema: &ModelSchema,
        document: &Document,
        is_new: bool,
    ) -> RecorderResult<()> {
        let actor = self.resolve_actor();
        let id = document.id();
        let current = schema.normalize(document);

        let ctx = if is_new {
            RecordContext::new(OperationKind::Create, WriteMethod::Save, schema)
        } else {
            let prior = match id {
                Some(id) => self.store.find_by_id(schema.collection_name(), id).await?,
                None => None,
            };
            RecordContext::new(OperationKind::Update, WriteMethod::Save, schema)
                .with_old(prior.map(|raw| schema.normalize(&raw)))
        };
        let ctx = ctx.with_document_id(id).with_current(current).with_actor(actor);
        self.recorder.record_change(ctx).await?;
        Ok(())
    }

    async fn pre_delete_one(
        &self,
        schema: &ModelSchema,
        method: WriteMethod,
        filter: &Filter,
    ) -> RecorderResult<()> {
        let actor = self.resolve_actor();
        let raw = self.store.find_one(schema.collection_name(), filter).await?;
        self.record_delete(schema, OperationKind::Delete, method, raw, actor)
            .await
    }

    async fn pre_delete_many(&self, schema: &ModelSchema, filter: &Filter) -> RecorderResult<()> {
        if !self.bulk_enabled(schema, WriteMethod::DeleteMany) {
            return Ok(());
        }
        let actor = self.resolve_actor();
        let matched = self.store.find_many(schema.collection_name(), filter).await?;
        debug!(model = schema.model_name(), matched = matched.len(), "auditing bulk delete");
        for raw in matched {
            self.record_delete(
                schema,
                OperationKind::BulkDelete,
                WriteMethod::DeleteMany,
                Some(raw),
                actor.clone(),
            )
            .await?;
        }
        Ok(())
    }

    async fn post_insert_many(
        &self,
        schema: &ModelSchema,
        documents: &[Document],
    ) -> RecorderResult<()> {
        let actor = self.resolve_actor();
        for document in documents {
            let ctx = RecordContext::new(OperationKind::BulkInsert, WriteMethod::InsertMany, schema)
                .with_document_id(document.id())
                .with_current(schema.normalize(document))
                .with_actor(actor.clone());
            self.recorder.record_change(ctx).await?;
        }
        Ok(())
    }

    async fn pre_update_one(
        &self,
        schema: &ModelSchema,
        method: WriteMethod,
        filter: &Filter,
        update: &Update,
    ) -> RecorderResult<()> {
        let actor = self.resolve_actor();
        let raw = self.store.find_one(schema.collection_name(), filter).await?;
        self.record_update(schema, OperationKind::TargetedUpdate, method, raw, update, actor)
            .await
    }

    async fn pre_update_many(
        &self,
        schema: &ModelSchema,
        filter: &Filter,
        update: &Update,
    ) -> RecorderResult<()> {
        if !self.bulk_enabled(schema, WriteMethod::UpdateMany) {
            return Ok(());
        }
        let actor = self.resolve_actor();
        let matched = self.store.find_many(schema.collection_name(), filter).await?;
        debug!(model = schema.model_name(), matched = matched.len(), "auditing bulk update");
        for raw in matched {
            self.record_update(
                schema,
                OperationKind::BulkUpdate,
                WriteMethod::UpdateMany,
                Some(raw),
                update,
                actor.clone(),
            )
            .await?;
        }
        Ok(())
    }
}
