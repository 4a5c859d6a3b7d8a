use serde::{Deserialize, Serialize};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::{SearchHit, Strategy, TaskClassification, TaskId};

/// The record threaded through every node of one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub prompt: String,
    pub task_id: TaskId,
    /// Reserved for attached documents; always empty for now.
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub classification: Option<TaskClassification>,
    #[serde(default)]
    pub search_query: Option<String>,
    /// `Some(vec![])` means the search ran and came back empty or failed.
    #[serde(default)]
    pub search_results: Option<Vec<SearchHit>>,
    #[serde(default)]
    pub search_error: Option<String>,
    #[serde(default)]
    pub response: String,
}

impl TaskState {
    pub fn new(task_id: TaskId, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            task_id,
            documents: Vec::new(),
            classification: None,
            search_query: None,
            search_results: None,
            search_error: None,
            response: String::new(),
        }
    }

    /// The strategy chosen by the classifier, if it has run.
    pub fn strategy(&self) -> Option<Strategy> {
        self.classification.as_ref().map(|c| c.task)
    }

    /// Merge a node's partial update.
    ///
    /// Classification is write-once, and so is the response: exactly one
    /// terminal node contributes it per execution.
    pub fn apply(&mut self, update: StateUpdate) -> Result<()> {
        if let Some(classification) = update.classification {
            if self.classification.is_some() {
                return Err(SwitchyardError::Graph(
                    "classification is already set".to_string(),
                ));
            }
            self.classification = Some(classification);
        }
        if let Some(response) = update.response {
            if !self.response.is_empty() {
                return Err(SwitchyardError::Graph("response is already set".to_string()));
            }
            self.response = response;
        }
        if update.search_query.is_some() {
            self.search_query = update.search_query;
        }
        if update.search_results.is_some() {
            self.search_results = update.search_results;
        }
        if update.search_error.is_some() {
            self.search_error = update.search_error;
        }
        Ok(())
    }
}

/// Partial state produced by a node. `None` fields leave the state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub classification: Option<TaskClassification>,
    pub search_query: Option<String>,
    pub search_results: Option<Vec<SearchHit>>,
    pub search_error: Option<String>,
    pub response: Option<String>,
}

impl StateUpdate {
    pub fn response(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn classification(classification: TaskClassification) -> Self {
        Self {
            classification: Some(classification),
            ..Default::default()
        }
    }
}
