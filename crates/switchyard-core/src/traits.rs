use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Language generation capability.
pub trait Generator: Send + Sync + 'static {
    /// Short name for logs (e.g. "openai", "offline").
    fn name(&self) -> &str;

    /// Free-text generation.
    fn invoke(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>>;

    /// Structured generation constrained to the classification schema.
    fn invoke_structured(&self, prompt: String) -> BoxFuture<'_, Result<TaskClassification>>;
}

/// Web search capability.
pub trait SearchProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Return at most `top_k` results in rank order.
    fn search(&self, query: &str, top_k: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>>;
}

/// Durable trajectory log, keyed by task id.
pub trait TrajectoryStore: Send + Sync + 'static {
    /// Create the record if it does not exist yet (status In Progress, empty trajectory).
    fn log_task_start(&self, task_id: &TaskId, prompt: &str) -> BoxFuture<'_, Result<()>>;

    /// Append one node visit, creating a bare record if needed.
    fn log_step(&self, task_id: &TaskId, node: &str) -> BoxFuture<'_, Result<()>>;

    /// Replace the final fields, creating the record if needed.
    fn log_task_end(&self, task_id: &TaskId, outcome: &TaskOutcome) -> BoxFuture<'_, Result<()>>;

    /// Look a record up. A miss is `Ok(None)`.
    fn get_task(&self, task_id: &TaskId) -> BoxFuture<'_, Result<Option<TrajectoryRecord>>>;
}
