//! Node strategies. Each node owns handles to the capabilities it needs and
//! appends exactly one trajectory step named after itself.

pub mod classifier;
pub mod content;
pub mod respond;
pub mod web_search;

pub use classifier::ClassifierNode;
pub use content::ContentNode;
pub use respond::RespondNode;
pub use web_search::{WebSearchNode, SEARCH_TOP_K};
