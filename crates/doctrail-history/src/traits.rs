use async_trait::async_trait;

use crate::container::{ContainerHandle, ContainerShape, IndexSpec};
use crate::error::HistoryResult;
use crate::event::{ChangeEvent, HistoryRecord};

/// Persistence boundary for change events.
///
/// All implementations must satisfy these invariants:
/// - `register_container` is idempotent: registering a name that already
///   exists returns the existing handle and ignores the new shape.
/// - `persist` either stores the event or returns an error. Failures are
///   never swallowed; the caller of the triggering write sees them.
/// - Metadata options of the container are evaluated at persist time.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Register (or look up) the container named `name`.
    async fn register_container(
        &self,
        name: &str,
        shape: ContainerShape,
        indexes: &[IndexSpec],
    ) -> HistoryResult<ContainerHandle>;

    /// Store one event in a registered container.
    async fn persist(&self, container: &ContainerHandle, event: &ChangeEvent) -> HistoryResult<()>;

    /// Every record in the container, oldest first.
    async fn records(&self, container: &str) -> HistoryResult<Vec<HistoryRecord>>;

    /// Drop every event of `model_name` from the container. Returns the
    /// number of events removed.
    async fn clear_model(&self, container: &str, model_name: &str) -> HistoryResult<usize>;
}
