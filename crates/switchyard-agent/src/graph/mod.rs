//! Task orchestration graph.
//!
//! The classifier always runs first. Its routing decision selects one of the
//! strategy nodes through the transition table in [`edge`]; `content` chains
//! into `content_post_web_search`, every other strategy node ends the run.
//! The executor checkpoints the state after each node so a run can be
//! resumed by task id.

pub mod edge;
pub mod executor;
pub mod node;

pub use edge::{next, Transition};
pub use executor::TaskGraph;
pub use node::{NodeId, NodeOutput, TaskNode};
