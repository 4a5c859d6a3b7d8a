use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use switchyard_core::error::Result;
use switchyard_core::traits::{Generator, TrajectoryStore};

use crate::graph::{NodeId, NodeOutput, TaskNode};
use crate::prompts;
use crate::state::{StateUpdate, TaskState};

/// Picks the handling strategy. Always the first node of a run.
pub struct ClassifierNode {
    store: Arc<dyn TrajectoryStore>,
    generator: Arc<dyn Generator>,
}

impl ClassifierNode {
    pub fn new(store: Arc<dyn TrajectoryStore>, generator: Arc<dyn Generator>) -> Self {
        Self { store, generator }
    }
}

impl TaskNode for ClassifierNode {
    fn id(&self) -> NodeId {
        NodeId::TaskClassification
    }

    fn run<'a>(&'a self, state: &'a TaskState) -> BoxFuture<'a, Result<NodeOutput>> {
        Box::pin(async move {
            let classification = self
                .generator
                .invoke_structured(prompts::classification(&state.prompt))
                .await?;
            debug!(
                task_id = %state.task_id,
                strategy = %classification.task,
                reason = %classification.choice_summary,
                "Task classified"
            );

            self.store.log_step(&state.task_id, self.id().name()).await?;

            Ok(NodeOutput {
                goto: Some(classification.task),
                update: StateUpdate::classification(classification),
            })
        })
    }
}
