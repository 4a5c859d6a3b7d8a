use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::event::EventBus;
use switchyard_core::traits::{Generator, SearchProvider, TrajectoryStore};
use switchyard_core::types::{Strategy, TaskEvent, TaskId};

use super::edge::{self, Transition};
use super::node::{NodeId, TaskNode};
use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::nodes::{ClassifierNode, ContentNode, RespondNode, WebSearchNode};
use crate::state::TaskState;

/// Executes the task graph.
///
/// Nodes run strictly in sequence. After every node the state is merged,
/// the transition table picks the next node, and a checkpoint is written so
/// [`TaskGraph::resume`] can continue an interrupted run.
pub struct TaskGraph {
    nodes: HashMap<NodeId, Box<dyn TaskNode>>,
    checkpointer: Arc<dyn Checkpointer>,
    event_bus: Option<Arc<EventBus>>,
}

impl TaskGraph {
    /// Build the standard graph. Every node shares the same store and
    /// capability handles.
    pub fn new(
        store: Arc<dyn TrajectoryStore>,
        generator: Arc<dyn Generator>,
        search: Arc<dyn SearchProvider>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        let mut nodes: Vec<Box<dyn TaskNode>> = vec![
            Box::new(ClassifierNode::new(store.clone(), generator.clone())),
            Box::new(WebSearchNode::new(store.clone(), generator.clone(), search)),
            Box::new(ContentNode::new(store.clone(), generator.clone())),
        ];
        for strategy in [Strategy::General, Strategy::Code, Strategy::Summarize] {
            nodes.push(Box::new(RespondNode::new(
                strategy,
                store.clone(),
                generator.clone(),
            )));
        }
        Self::from_nodes(nodes, checkpointer)
    }

    /// Build a graph from explicit nodes.
    pub fn from_nodes(nodes: Vec<Box<dyn TaskNode>>, checkpointer: Arc<dyn Checkpointer>) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.id(), n)).collect();
        Self {
            nodes,
            checkpointer,
            event_bus: None,
        }
    }

    /// Publish `NodeEntered` / `SearchDegraded` events on the bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Run a fresh task from the entry node to completion.
    pub async fn run(&self, initial: TaskState) -> Result<TaskState> {
        let checkpoint = Checkpoint::start(initial);
        self.checkpointer.save(&checkpoint)?;
        self.drive(checkpoint).await
    }

    /// Continue from the last checkpoint for `task_id`. A finished
    /// checkpoint returns its final state without running anything.
    pub async fn resume(&self, task_id: &TaskId) -> Result<TaskState> {
        let checkpoint = self.checkpointer.load(task_id)?.ok_or_else(|| {
            SwitchyardError::Checkpoint(format!("no checkpoint for task {}", task_id))
        })?;
        if checkpoint.is_finished() {
            debug!(task_id = %task_id, "Checkpoint already finished");
        } else {
            info!(task_id = %task_id, next = ?checkpoint.next, "Resuming task from checkpoint");
        }
        self.drive(checkpoint).await
    }

    async fn drive(&self, mut checkpoint: Checkpoint) -> Result<TaskState> {
        let start = Instant::now();

        while let Some(node_id) = checkpoint.next {
            if checkpoint.visited.contains(&node_id) {
                return Err(SwitchyardError::Graph(format!(
                    "node '{}' would be visited twice",
                    node_id
                )));
            }
            let node = self.nodes.get(&node_id).ok_or_else(|| {
                SwitchyardError::Graph(format!("node '{}' not found in graph", node_id))
            })?;

            let task_id = checkpoint.task_id().clone();
            info!(task_id = %task_id, node = %node_id, "Executing task node");
            self.publish(TaskEvent::NodeEntered {
                task_id: task_id.clone(),
                node: node_id.name().to_string(),
            });

            let output = node.run(&checkpoint.state).await?;

            if let Some(error) = &output.update.search_error {
                self.publish(TaskEvent::SearchDegraded {
                    task_id: task_id.clone(),
                    error: error.clone(),
                });
            }

            checkpoint.state.apply(output.update)?;
            checkpoint.visited.push(node_id);
            checkpoint.next = match edge::next(node_id, output.goto)? {
                Transition::Goto(next) => Some(next),
                Transition::End => None,
            };
            checkpoint.timestamp = Utc::now();
            self.checkpointer.save(&checkpoint)?;
        }

        debug!(
            task_id = %checkpoint.task_id(),
            nodes = checkpoint.visited.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Task graph complete"
        );
        Ok(checkpoint.state)
    }

    fn publish(&self, event: TaskEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
