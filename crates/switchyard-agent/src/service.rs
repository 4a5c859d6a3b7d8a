use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::TrajectoryStore;
use switchyard_core::types::{SearchHit, TaskId, TaskOutcome, TaskStatus};

use crate::worker::{TaskJob, TaskQueue};

/// Status reported for a task that was accepted for execution.
pub const QUEUED: &str = "QUEUED";

/// Reply to a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

/// Reply to a status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub task_id: String,
    pub status: String,
    pub final_response: Option<String>,
    #[serde(default)]
    pub search_results: Vec<SearchHit>,
}

/// Submission and status boundary shared by the gateway and the CLI.
pub struct TaskService {
    store: Arc<dyn TrajectoryStore>,
    queue: TaskQueue,
}

impl TaskService {
    pub fn new(store: Arc<dyn TrajectoryStore>, queue: TaskQueue) -> Self {
        Self { store, queue }
    }

    /// Accept a task and queue it for execution. Never waits on the queue.
    ///
    /// The start record is written before the job is queued, so a status
    /// poll right after this returns already sees `In Progress`. If the
    /// queue is full or closed the record is marked `Failed` and a `Queue`
    /// error is returned.
    pub async fn submit(&self, task: &str, thread_id: Option<&str>) -> Result<SubmitResponse> {
        if task.trim().is_empty() {
            return Err(SwitchyardError::InvalidInput("task must not be empty".to_string()));
        }

        let task_id = TaskId::new();
        info!(task_id = %task_id, thread_id = thread_id.unwrap_or("-"), "Task submitted");
        self.store.log_task_start(&task_id, task).await?;

        let job = TaskJob {
            task_id: task_id.clone(),
            prompt: task.to_string(),
        };
        if let Err(e) = self.queue.enqueue(job) {
            let outcome = TaskOutcome::failed(&e.to_string());
            if let Err(log_err) = self.store.log_task_end(&task_id, &outcome).await {
                warn!(task_id = %task_id, error = %log_err, "Failed to record enqueue failure");
            }
            return Err(e);
        }

        Ok(SubmitResponse {
            task_id: task_id.to_string(),
            status: QUEUED.to_string(),
            message: format!(
                "Task received and queued. Task ID: {}. Poll the status endpoint for results.",
                task_id
            ),
        })
    }

    /// Look a task up. Never fails: a miss, a store error or a malformed
    /// record all read as `Unknown`.
    pub async fn status(&self, task_id: &str) -> StatusResponse {
        let id = TaskId::from_string(task_id);
        let record = match self.store.get_task(&id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Status lookup failed");
                None
            }
        };

        match record {
            Some(record) if record.status.is_terminal() => StatusResponse {
                task_id: task_id.to_string(),
                status: record.status.to_string(),
                final_response: record.final_response,
                search_results: record.search_results,
            },
            Some(record) => StatusResponse {
                task_id: task_id.to_string(),
                status: record.status.to_string(),
                final_response: None,
                search_results: Vec::new(),
            },
            None => StatusResponse {
                task_id: task_id.to_string(),
                status: TaskStatus::Unknown.to_string(),
                final_response: None,
                search_results: Vec::new(),
            },
        }
    }
}
