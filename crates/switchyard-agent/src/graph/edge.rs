use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::Strategy;

use super::node::NodeId;

/// Where the executor goes after a node finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Goto(NodeId),
    End,
}

/// Transition table for the task graph.
///
/// The classifier's routing tag picks the next node directly. `content` always
/// continues to `content_post_web_search`. All other nodes are terminal, so no
/// path revisits a node.
pub fn next(current: NodeId, routed: Option<Strategy>) -> Result<Transition> {
    match current {
        NodeId::TaskClassification => routed
            .map(|strategy| Transition::Goto(NodeId::for_strategy(strategy)))
            .ok_or_else(|| {
                SwitchyardError::Graph("classifier produced no routing decision".to_string())
            }),
        NodeId::Content => Ok(Transition::Goto(NodeId::ContentPostWebSearch)),
        NodeId::General | NodeId::Code | NodeId::Summarize | NodeId::ContentPostWebSearch => {
            Ok(Transition::End)
        }
    }
}
