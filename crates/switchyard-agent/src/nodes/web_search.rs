use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use switchyard_core::error::Result;
use switchyard_core::traits::{Generator, SearchProvider, TrajectoryStore};
use switchyard_core::types::{GenerationRequest, Purpose};

use crate::graph::{NodeId, NodeOutput, TaskNode};
use crate::prompts;
use crate::state::{StateUpdate, TaskState};

/// Number of results requested from the search provider.
pub const SEARCH_TOP_K: usize = 4;

/// First half of the `content` strategy: derive a query and search the web.
///
/// A search failure never fails the task. The node records empty results
/// plus the error and lets generation continue without sources. A failure
/// deriving the query does fail it.
pub struct WebSearchNode {
    store: Arc<dyn TrajectoryStore>,
    generator: Arc<dyn Generator>,
    search: Arc<dyn SearchProvider>,
}

impl WebSearchNode {
    pub fn new(
        store: Arc<dyn TrajectoryStore>,
        generator: Arc<dyn Generator>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            store,
            generator,
            search,
        }
    }
}

impl TaskNode for WebSearchNode {
    fn id(&self) -> NodeId {
        NodeId::Content
    }

    fn run<'a>(&'a self, state: &'a TaskState) -> BoxFuture<'a, Result<NodeOutput>> {
        Box::pin(async move {
            let request = GenerationRequest::new(
                Purpose::SearchQuery,
                prompts::search_query(&state.prompt),
                state.prompt.clone(),
            );
            let derived = self.generator.invoke(request).await?;
            let query = match derived.trim() {
                "" => {
                    debug!(task_id = %state.task_id, "Empty search query, using the prompt");
                    state.prompt.trim().to_string()
                }
                q => q.to_string(),
            };

            let (results, search_error) = match self.search.search(&query, SEARCH_TOP_K).await {
                Ok(mut hits) => {
                    hits.truncate(SEARCH_TOP_K);
                    debug!(
                        task_id = %state.task_id,
                        provider = self.search.name(),
                        hits = hits.len(),
                        "Web search complete"
                    );
                    (hits, None)
                }
                Err(e) => {
                    warn!(
                        task_id = %state.task_id,
                        provider = self.search.name(),
                        error = %e,
                        "Web search failed, continuing without sources"
                    );
                    (Vec::new(), Some(e.to_string()))
                }
            };

            self.store.log_step(&state.task_id, self.id().name()).await?;

            Ok(NodeOutput::update(StateUpdate {
                search_query: Some(query),
                search_results: Some(results),
                search_error,
                ..Default::default()
            }))
        })
    }
}
