use std::sync::Arc;

use futures::future::BoxFuture;

use switchyard_core::error::Result;
use switchyard_core::traits::{Generator, TrajectoryStore};
use switchyard_core::types::{GenerationRequest, Purpose, Strategy};

use crate::graph::{NodeId, NodeOutput, TaskNode};
use crate::prompts;
use crate::state::{StateUpdate, TaskState};

/// Second half of the `content` strategy: write the response, citing
/// whatever search results are present.
pub struct ContentNode {
    store: Arc<dyn TrajectoryStore>,
    generator: Arc<dyn Generator>,
}

impl ContentNode {
    pub fn new(store: Arc<dyn TrajectoryStore>, generator: Arc<dyn Generator>) -> Self {
        Self { store, generator }
    }
}

impl TaskNode for ContentNode {
    fn id(&self) -> NodeId {
        NodeId::ContentPostWebSearch
    }

    fn run<'a>(&'a self, state: &'a TaskState) -> BoxFuture<'a, Result<NodeOutput>> {
        Box::pin(async move {
            let sources = prompts::format_sources(state.search_results.as_deref().unwrap_or(&[]));
            let request = GenerationRequest::new(
                Purpose::Respond(Strategy::Content),
                prompts::content(&state.prompt, &sources),
                state.prompt.clone(),
            );
            let response = self.generator.invoke(request).await?;

            self.store.log_step(&state.task_id, self.id().name()).await?;
            Ok(NodeOutput::update(StateUpdate::response(response)))
        })
    }
}
