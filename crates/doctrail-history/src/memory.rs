use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use doctrail_types::Document;

use crate::container::{ContainerHandle, ContainerShape, IndexSpec};
use crate::error::{HistoryError, HistoryResult};
use crate::event::{ChangeEvent, HistoryRecord};
use crate::traits::HistoryStore;

struct Container {
    handle: ContainerHandle,
    records: Vec<HistoryRecord>,
}

type Containers = HashMap<String, Container>;

/// In-memory history store for tests and embedding.
pub struct InMemoryHistoryStore {
    containers: RwLock<Containers>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Number of events stored in `container` (0 if unregistered).
    pub fn len(&self, container: &str) -> HistoryResult<usize> {
        Ok(self.read()?.get(container).map_or(0, |c| c.records.len()))
    }

    /// Returns `true` if no container holds any event.
    pub fn is_empty(&self) -> HistoryResult<bool> {
        Ok(self.read()?.values().all(|c| c.records.is_empty()))
    }

    /// The handle registered under `name`.
    pub fn container(&self, name: &str) -> HistoryResult<Option<ContainerHandle>> {
        Ok(self.read()?.get(name).map(|c| c.handle.clone()))
    }

    fn read(&self) -> HistoryResult<RwLockReadGuard<'_, Containers>> {
        self.containers
            .read()
            .map_err(|_| HistoryError::LockPoisoned("history store read"))
    }

    fn write(&self) -> HistoryResult<RwLockWriteGuard<'_, Containers>> {
        self.containers
            .write()
            .map_err(|_| HistoryError::LockPoisoned("history store write"))
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn register_container(
        &self,
        name: &str,
        shape: ContainerShape,
        indexes: &[IndexSpec],
    ) -> HistoryResult<ContainerHandle> {
        let mut containers = self.write()?;
        if let Some(existing) = containers.get(name) {
            return Ok(existing.handle.clone());
        }
        let handle = ContainerHandle::new(name, shape, indexes.to_vec());
        containers.insert(
            name.to_string(),
            Container {
                handle: handle.clone(),
                records: Vec::new(),
            },
        );
        info!(container = name, indexes = indexes.len(), "registered history container");
        Ok(handle)
    }

    async fn persist(&self, container: &ContainerHandle, event: &ChangeEvent) -> HistoryResult<()> {
        let empty = Document::new();
        let old = event.old_document.as_ref().unwrap_or(&empty);
        let current = event.current_document.as_ref().unwrap_or(&empty);
        let metadata = container.shape().evaluate_metadata(old, current);

        let mut containers = self.write()?;
        let slot = containers
            .get_mut(container.name())
            .ok_or_else(|| HistoryError::UnknownContainer(container.name().to_string()))?;
        slot.records.push(HistoryRecord {
            event: event.clone(),
            metadata,
        });
        debug!(
            container = container.name(),
            event = %event.id,
            action = %event.action,
            "persisted change event"
        );
        Ok(())
    }

    async fn records(&self, container: &str) -> HistoryResult<Vec<HistoryRecord>> {
        let containers = self.read()?;
        containers
            .get(container)
            .map(|c| c.records.clone())
            .ok_or_else(|| HistoryError::UnknownContainer(container.to_string()))
    }

    async fn clear_model(&self, container: &str, model_name: &str) -> HistoryResult<usize> {
        let mut containers = self.write()?;
        let slot = containers
            .get_mut(container)
            .ok_or_else(|| HistoryError::UnknownContainer(container.to_string()))?;
        let before = slot.records.len();
        slot.records.retain(|r| r.event.model_name != model_name);
        let removed = before - slot.records.len();
        info!(container, model = model_name, removed, "cleared model history");
        Ok(removed)
    }
}

impl std::fmt::Debug for InMemoryHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("InMemoryHistoryStore")
            .field("container_count", &count)
            .finish()
    }
}
