use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use switchyard_core::error::Result;
use switchyard_core::types::Strategy;

use crate::state::{StateUpdate, TaskState};

/// Identifies a node in the task graph. The name doubles as the trajectory label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    TaskClassification,
    General,
    Code,
    Summarize,
    Content,
    ContentPostWebSearch,
}

impl NodeId {
    /// Every run starts here.
    pub const ENTRY: NodeId = NodeId::TaskClassification;

    pub fn name(&self) -> &'static str {
        match self {
            NodeId::TaskClassification => "task_classification",
            NodeId::General => "general",
            NodeId::Code => "code",
            NodeId::Summarize => "summarize",
            NodeId::Content => "content",
            NodeId::ContentPostWebSearch => "content_post_web_search",
        }
    }

    /// The node a routing decision dispatches to.
    pub fn for_strategy(strategy: Strategy) -> NodeId {
        match strategy {
            Strategy::General => NodeId::General,
            Strategy::Code => NodeId::Code,
            Strategy::Summarize => NodeId::Summarize,
            Strategy::Content => NodeId::Content,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a node hands back to the executor.
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    pub update: StateUpdate,
    /// Routing decision. Only the classifier sets this.
    pub goto: Option<Strategy>,
}

impl NodeOutput {
    pub fn update(update: StateUpdate) -> Self {
        Self { update, goto: None }
    }
}

/// A unit of computation in the task graph.
pub trait TaskNode: Send + Sync {
    fn id(&self) -> NodeId;

    fn run<'a>(&'a self, state: &'a TaskState) -> BoxFuture<'a, Result<NodeOutput>>;
}
