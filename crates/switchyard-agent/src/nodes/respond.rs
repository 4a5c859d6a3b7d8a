use std::sync::Arc;

use futures::future::BoxFuture;

use switchyard_core::error::Result;
use switchyard_core::traits::{Generator, TrajectoryStore};
use switchyard_core::types::{GenerationRequest, Purpose, Strategy};

use crate::graph::{NodeId, NodeOutput, TaskNode};
use crate::prompts;
use crate::state::{StateUpdate, TaskState};

/// Terminal node answering the prompt directly with one persona.
/// Serves the `general`, `code` and `summarize` strategies.
pub struct RespondNode {
    strategy: Strategy,
    store: Arc<dyn TrajectoryStore>,
    generator: Arc<dyn Generator>,
}

impl RespondNode {
    pub fn new(
        strategy: Strategy,
        store: Arc<dyn TrajectoryStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            strategy,
            store,
            generator,
        }
    }
}

impl TaskNode for RespondNode {
    fn id(&self) -> NodeId {
        NodeId::for_strategy(self.strategy)
    }

    fn run<'a>(&'a self, state: &'a TaskState) -> BoxFuture<'a, Result<NodeOutput>> {
        Box::pin(async move {
            let request = GenerationRequest::new(
                Purpose::Respond(self.strategy),
                prompts::respond(self.strategy, &state.prompt),
                state.prompt.clone(),
            );
            let response = self.generator.invoke(request).await?;

            self.store.log_step(&state.task_id, self.id().name()).await?;
            Ok(NodeOutput::update(StateUpdate::response(response)))
        })
    }
}
