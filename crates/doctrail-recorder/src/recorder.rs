use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use doctrail_diff::diff_documents;
use doctrail_history::{ChangeEvent, ContainerHandle, HistoryStore};

use crate::config::HistoryOptions;
use crate::error::{RecorderError, RecorderResult};
use crate::operation::{NoOpReason, RecordContext, RecordOutcome};

/// Turns a write's before/after snapshots into at most one persisted
/// [`ChangeEvent`].
///
/// The recorder holds no per-operation state: every call works only on the
/// [`RecordContext`] it is given. The audit container is registered once,
/// lazily, on first use.
pub struct ChangeRecorder {
    options: HistoryOptions,
    history: Arc<dyn HistoryStore>,
    container: OnceCell<ContainerHandle>,
}

impl ChangeRecorder {
    pub fn new(options: HistoryOptions, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            options,
            history,
            container: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &HistoryOptions {
        &self.options
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Register the audit container with the history store. Safe to call
    /// repeatedly; the store sees at most one registration from this recorder.
    pub async fn initialize_default_container(&self) -> RecorderResult<ContainerHandle> {
        let handle = self
            .container
            .get_or_try_init(|| async {
                let shape = self.options.container_shape()?;
                let handle = self
                    .history
                    .register_container(self.options.container_name(), shape, &self.options.indexes)
                    .await?;
                Ok::<_, RecorderError>(handle)
            })
            .await?;
        Ok(handle.clone())
    }

    /// The event `ctx` would produce, without persisting it.
    ///
    /// Returns `None` when the write should leave no trace: a bulk write
    /// while bulk auditing is off, a missing prior state, or no difference
    /// between the snapshots.
    pub fn build_event(&self, ctx: &RecordContext) -> Option<ChangeEvent> {
        if self.skip_reason(ctx).is_some() {
            return None;
        }
        let old = ctx.old.as_ref()?;

        let diff_options = if ctx.kind.is_deletion() {
            self.options.deletion_diff_options()
        } else {
            self.options.diff_options()
        };
        let changes = diff_documents(&ctx.current, old, &diff_options)?;

        let event = ChangeEvent::new(
            ctx.kind.action(),
            ctx.method,
            ctx.model_name.clone(),
            ctx.collection_name.clone(),
            changes,
        )
        .with_document_id(ctx.document_id)
        .with_modified_by(ctx.actor.clone());

        if self.options.diff_only {
            Some(event)
        } else {
            Some(event.with_snapshots(old.clone(), ctx.current.clone()))
        }
    }

    /// Decide on `ctx` and persist the resulting event, if any.
    ///
    /// A persistence failure is returned to the caller unchanged.
    pub async fn record_change(&self, ctx: RecordContext) -> RecorderResult<RecordOutcome> {
        let event = match self.skip_reason(&ctx) {
            Some(reason) => Err(reason),
            None => self.build_event(&ctx).ok_or(NoOpReason::NoChanges),
        };
        let event = match event {
            Ok(event) => event,
            Err(reason) => {
                debug!(
                    model = %ctx.model_name,
                    method = %ctx.method,
                    kind = %ctx.kind,
                    %reason,
                    "nothing to record"
                );
                return Ok(RecordOutcome::NoOp(reason));
            }
        };

        let container = self.initialize_default_container().await?;
        self.history.persist(&container, &event).await?;

        info!(
            model = %event.model_name,
            method = %event.method,
            action = %event.action,
            document_id = ?event.document_id,
            paths = ?event.changes.paths(),
            "recorded change"
        );
        Ok(RecordOutcome::Recorded(event))
    }

    fn skip_reason(&self, ctx: &RecordContext) -> Option<NoOpReason> {
        if ctx.kind.is_bulk_write() && !self.options.audit_bulk_operations {
            Some(NoOpReason::BulkAuditDisabled)
        } else if ctx.old.is_none() {
            Some(NoOpReason::TargetMissing)
        } else {
            None
        }
    }

    /// Drop every recorded event of `model_name`. Returns how many were
    /// removed.
    pub async fn clear_history(&self, model_name: &str) -> RecorderResult<usize> {
        let container = self.initialize_default_container().await?;
        let removed = self.history.clear_model(container.name(), model_name).await?;
        Ok(removed)
    }
}

impl std::fmt::Debug for ChangeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRecorder")
            .field("options", &self.options)
            .field("initialized", &self.container.initialized())
            .finish_non_exhaustive()
    }
}
