use std::sync::Arc;

use tracing::{error, info, warn};

use switchyard_core::error::Result;
use switchyard_core::event::EventBus;
use switchyard_core::traits::TrajectoryStore;
use switchyard_core::types::{Strategy, TaskEvent, TaskId, TaskOutcome, TaskStatus};

use crate::graph::TaskGraph;
use crate::state::TaskState;

/// Runs one task through the graph and brackets it with trajectory writes.
pub struct TaskDriver {
    graph: Arc<TaskGraph>,
    store: Arc<dyn TrajectoryStore>,
    event_bus: Arc<EventBus>,
}

impl TaskDriver {
    pub fn new(
        graph: Arc<TaskGraph>,
        store: Arc<dyn TrajectoryStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            graph,
            store,
            event_bus,
        }
    }

    /// Execute a task to completion.
    ///
    /// On failure the record is marked `Failed` with the error text as its
    /// response, and the error is returned so the caller's own failure
    /// handling still applies.
    pub async fn execute(&self, task_id: &TaskId, prompt: &str) -> Result<TaskState> {
        self.store.log_task_start(task_id, prompt).await?;
        self.event_bus.publish(TaskEvent::TaskStarted {
            task_id: task_id.clone(),
        });
        info!(task_id = %task_id, "Task started");

        match self
            .graph
            .run(TaskState::new(task_id.clone(), prompt))
            .await
        {
            Ok(state) => {
                let (strategy, choice_summary) = match &state.classification {
                    Some(c) => (c.task, c.choice_summary.clone()),
                    None => (Strategy::default(), String::new()),
                };
                let outcome = TaskOutcome {
                    status: TaskStatus::Completed,
                    final_response: state.response.clone(),
                    task: strategy.to_string(),
                    task_choice_summary: choice_summary,
                    search_query: state.search_query.clone(),
                    search_results: state.search_results.clone().unwrap_or_default(),
                    search_error: state.search_error.clone(),
                };
                self.store.log_task_end(task_id, &outcome).await?;
                self.event_bus.publish(TaskEvent::TaskCompleted {
                    task_id: task_id.clone(),
                    strategy,
                });
                info!(task_id = %task_id, strategy = %strategy, "Task completed");
                Ok(state)
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Task failed");
                let outcome = TaskOutcome::failed(&e.to_string());
                if let Err(log_err) = self.store.log_task_end(task_id, &outcome).await {
                    warn!(task_id = %task_id, error = %log_err, "Failed to record task failure");
                }
                self.event_bus.publish(TaskEvent::TaskFailed {
                    task_id: task_id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Mark a task that will never run as `Failed`.
    pub async fn abandon(&self, task_id: &TaskId, reason: &str) {
        let outcome = TaskOutcome::failed(reason);
        if let Err(e) = self.store.log_task_end(task_id, &outcome).await {
            warn!(task_id = %task_id, error = %e, "Failed to record abandoned task");
        }
        self.event_bus.publish(TaskEvent::TaskFailed {
            task_id: task_id.clone(),
            error: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointer;
    use switchyard_core::traits::{Generator, SearchProvider};
    use switchyard_core::types::LifecycleEvent;
    use switchyard_llm::OfflineGenerator;
    use switchyard_store::SqliteTrajectoryStore;
    use switchyard_test_utils::{FailingGenerator, FailingSearch, ScriptedGenerator, StaticSearch};

    fn driver(
        generator: Arc<dyn Generator>,
        search: Arc<dyn SearchProvider>,
    ) -> (TaskDriver, Arc<SqliteTrajectoryStore>, Arc<EventBus>) {
        let store = Arc::new(SqliteTrajectoryStore::in_memory().unwrap());
        let bus = Arc::new(EventBus::default());
        let graph = Arc::new(
            TaskGraph::new(
                store.clone(),
                generator,
                search,
                Arc::new(MemoryCheckpointer::new(16)),
            )
            .with_event_bus(bus.clone()),
        );
        (TaskDriver::new(graph, store.clone(), bus.clone()), store, bus)
    }

    #[tokio::test]
    async fn test_completed_record() {
        let (driver, store, _) =
            driver(Arc::new(OfflineGenerator::new()), Arc::new(StaticSearch::empty()));
        let id = TaskId::new();
        driver.execute(&id, "Summarize the history of Rome").await.unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.current_event, Some(LifecycleEvent::End));
        assert_eq!(record.prompt, "Summarize the history of Rome");
        assert_eq!(record.task.as_deref(), Some("general"));
        assert_eq!(
            record.task_choice_summary.as_deref(),
            Some("default choice when no llm is used")
        );
        assert_eq!(
            record.final_response.as_deref(),
            Some("Hi, I am the general task agent!")
        );
        assert!(record.search_query.is_none());
    }

    #[tokio::test]
    async fn test_failed_record_and_error_returned() {
        let (driver, store, bus) = driver(
            Arc::new(FailingGenerator::new("model unreachable")),
            Arc::new(StaticSearch::empty()),
        );
        let mut rx = bus.subscribe();
        let id = TaskId::new();
        let err = driver.execute(&id, "anything").await.unwrap_err();
        assert!(err.to_string().contains("model unreachable"));

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.task.as_deref(), Some("error"));
        assert_eq!(record.task_choice_summary.as_deref(), Some("execution failed"));
        let response = record.final_response.unwrap();
        assert!(response.starts_with("ERROR: "));
        assert!(response.contains("model unreachable"));

        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            if let TaskEvent::TaskFailed { task_id, .. } = event {
                assert_eq!(task_id, id);
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn test_failure_after_classification_recorded() {
        let generator =
            ScriptedGenerator::new(Strategy::Summarize).failing_invoke("summarizer timed out");
        let (driver, store, _) = driver(Arc::new(generator), Arc::new(StaticSearch::empty()));
        let id = TaskId::new();
        assert!(driver.execute(&id, "Summarize this article").await.is_err());

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.task.as_deref(), Some("error"));
        assert_eq!(record.node_names(), vec!["task_classification"]);
        assert!(record.final_response.unwrap().contains("summarizer timed out"));
    }

    #[tokio::test]
    async fn test_query_derivation_failure_recorded() {
        let generator = ScriptedGenerator::new(Strategy::Content).failing_invoke("quota exceeded");
        let (driver, store, _) = driver(Arc::new(generator), Arc::new(StaticSearch::numbered(3)));
        let id = TaskId::new();
        assert!(driver.execute(&id, "Write a blog about Rome").await.is_err());

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.node_names(), vec!["task_classification"]);
        assert!(record.search_results.is_empty());
        assert!(record.search_error.is_none());
    }

    #[tokio::test]
    async fn test_degraded_search_recorded() {
        let (driver, store, _) = driver(
            Arc::new(ScriptedGenerator::new(Strategy::Content)),
            Arc::new(FailingSearch::new()),
        );
        let id = TaskId::new();
        driver.execute(&id, "Write a blog about Rome").await.unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.task.as_deref(), Some("content"));
        assert_eq!(record.search_query.as_deref(), Some("scripted search query"));
        assert!(record.search_results.is_empty());
        assert!(record.search_error.unwrap().contains("unavailable"));
        assert!(!record.final_response.unwrap().contains("[Source"));
    }

    #[tokio::test]
    async fn test_abandon_marks_queued_task_failed() {
        let (driver, store, _) =
            driver(Arc::new(OfflineGenerator::new()), Arc::new(StaticSearch::empty()));
        let id = TaskId::new();
        store.log_task_start(&id, "never ran").await.unwrap();
        driver.abandon(&id, "worker shut down before execution").await;

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.prompt, "never ran");
        assert!(record.trajectory.is_empty());
        assert_eq!(
            record.final_response.as_deref(),
            Some("ERROR: worker shut down before execution")
        );
    }

    #[tokio::test]
    async fn test_existing_start_record_kept() {
        let (driver, store, _) =
            driver(Arc::new(OfflineGenerator::new()), Arc::new(StaticSearch::empty()));
        let id = TaskId::new();
        store.log_task_start(&id, "submitted prompt").await.unwrap();
        driver.execute(&id, "submitted prompt").await.unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.node_names(), vec!["task_classification", "general"]);
    }
}
