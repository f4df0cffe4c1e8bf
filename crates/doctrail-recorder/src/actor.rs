//! Resolution of the acting user for each write.
//!
//! The actor is read once per operation and threaded through the
//! [`RecordContext`](crate::RecordContext); nothing caches it between calls.

use std::future::Future;

use doctrail_types::{Document, Value};

tokio::task_local! {
    static REQUEST_CONTEXT: Document;
}

/// Source of the current actor identity.
pub trait ActorContext: Send + Sync {
    /// The actor stored under `context_path`, or `None` if absent.
    fn get(&self, context_path: &str) -> Option<Value>;
}

/// Never resolves an actor.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoActorContext;

impl ActorContext for NoActorContext {
    fn get(&self, _context_path: &str) -> Option<Value> {
        None
    }
}

/// Resolves every path to the same actor. Useful for scripts and tests.
#[derive(Clone, Debug)]
pub struct StaticActorContext(pub Value);

impl ActorContext for StaticActorContext {
    fn get(&self, _context_path: &str) -> Option<Value> {
        Some(self.0.clone())
    }
}

/// Reads the actor from the request context of the current task.
///
/// Each in-flight request runs inside its own [`with_request_context`]
/// scope, so concurrent operations never see each other's actor.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskLocalActorContext;

impl ActorContext for TaskLocalActorContext {
    fn get(&self, context_path: &str) -> Option<Value> {
        REQUEST_CONTEXT
            .try_with(|ctx| ctx.get(context_path).cloned())
            .ok()
            .flatten()
            .filter(|value| !value.is_null())
    }
}

/// Run `future` with `context` as its request context.
pub async fn with_request_context<F>(context: Document, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_CONTEXT.scope(context, future).await
}

/// A copy of the current task's request context, if one is set.
pub fn current_request_context() -> Option<Document> {
    REQUEST_CONTEXT.try_with(Document::clone).ok()
}
