use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SwitchyardError;

/// Unique task identifier. Correlates the queue job, the checkpoint and the
/// trajectory record.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handling strategy chosen by the classifier.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    General,
    Code,
    Summarize,
    Content,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::General,
        Strategy::Code,
        Strategy::Summarize,
        Strategy::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::General => "general",
            Strategy::Code => "code",
            Strategy::Summarize => "summarize",
            Strategy::Content => "content",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = SwitchyardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Strategy::General),
            "code" => Ok(Strategy::Code),
            "summarize" => Ok(Strategy::Summarize),
            "content" => Ok(Strategy::Content),
            other => Err(SwitchyardError::GenerationParse(format!(
                "unknown strategy '{}'",
                other
            ))),
        }
    }
}

/// Classifier output: the chosen strategy and the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskClassification {
    pub task: Strategy,
    pub choice_summary: String,
}

/// One web search result, in provider rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// What a generation call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Produce the task response for the given strategy.
    Respond(Strategy),
    /// Turn the user prompt into a web search query.
    SearchQuery,
}

/// A single unstructured generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub purpose: Purpose,
    /// Fully rendered instruction sent to the model.
    pub prompt: String,
    /// The user's original prompt, untouched.
    pub input: String,
}

impl GenerationRequest {
    pub fn new(purpose: Purpose, prompt: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            purpose,
            prompt: prompt.into(),
            input: input.into(),
        }
    }
}

/// Persisted task status.
///
/// `Unknown` is never written; it is what readers see for a missing or
/// malformed record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Failed,
    #[default]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Unknown => "Unknown",
        }
    }

    /// Decode a stored status; anything unrecognized reads as `Unknown`.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("In Progress") => TaskStatus::InProgress,
            Some("Completed") => TaskStatus::Completed,
            Some("Failed") => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last lifecycle event written to a trajectory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleEvent {
    Start,
    End,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "START",
            LifecycleEvent::End => "END",
        }
    }

    pub fn from_stored(raw: Option<&str>) -> Option<Self> {
        match raw {
            Some("START") => Some(LifecycleEvent::Start),
            Some("END") => Some(LifecycleEvent::End),
            _ => None,
        }
    }
}

/// One node visit in a task's trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    pub node: String,
    pub timestamp: DateTime<Utc>,
}

/// The durable per-task log document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub task_id: TaskId,
    pub prompt: String,
    pub status: TaskStatus,
    pub current_event: Option<LifecycleEvent>,
    pub trajectory: Vec<TrajectoryStep>,
    pub final_response: Option<String>,
    pub task: Option<String>,
    pub task_choice_summary: Option<String>,
    pub search_query: Option<String>,
    pub search_results: Vec<SearchHit>,
    pub search_error: Option<String>,
}

impl TrajectoryRecord {
    /// Node names in execution order.
    pub fn node_names(&self) -> Vec<&str> {
        self.trajectory.iter().map(|s| s.node.as_str()).collect()
    }
}

/// Fields replaced on a trajectory record when a task ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub final_response: String,
    /// Strategy tag, or `error` for a failed run.
    pub task: String,
    pub task_choice_summary: String,
    pub search_query: Option<String>,
    pub search_results: Vec<SearchHit>,
    pub search_error: Option<String>,
}

impl TaskOutcome {
    /// Outcome written when the graph run fails.
    pub fn failed(error: &str) -> Self {
        Self {
            status: TaskStatus::Failed,
            final_response: format!("ERROR: {}", error),
            task: "error".to_string(),
            task_choice_summary: "execution failed".to_string(),
            search_query: None,
            search_results: Vec::new(),
            search_error: None,
        }
    }
}

/// Task lifecycle events published on the [`EventBus`](crate::EventBus).
#[derive(Debug, Clone)]
pub enum TaskEvent {
    TaskStarted {
        task_id: TaskId,
    },
    NodeEntered {
        task_id: TaskId,
        node: String,
    },
    SearchDegraded {
        task_id: TaskId,
        error: String,
    },
    TaskCompleted {
        task_id: TaskId,
        strategy: Strategy,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::TaskStarted { task_id }
            | TaskEvent::NodeEntered { task_id, .. }
            | TaskEvent::SearchDegraded { task_id, .. }
            | TaskEvent::TaskCompleted { task_id, .. }
            | TaskEvent::TaskFailed { task_id, .. } => task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("code".parse::<Strategy>().unwrap(), Strategy::Code);
        assert_eq!(" Summarize ".parse::<Strategy>().unwrap(), Strategy::Summarize);
        assert!("poetry".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_lowercase() {
        let json = serde_json::to_string(&Strategy::Content).unwrap();
        assert_eq!(json, "\"content\"");
        let parsed: TaskClassification =
            serde_json::from_str(r#"{"task":"code","choice_summary":"asks for a script"}"#)
                .unwrap();
        assert_eq!(parsed.task, Strategy::Code);
    }

    #[test]
    fn test_status_from_stored() {
        assert_eq!(
            TaskStatus::from_stored(Some("In Progress")),
            TaskStatus::InProgress
        );
        assert_eq!(TaskStatus::from_stored(Some("Completed")), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_stored(Some("Error")), TaskStatus::Unknown);
        assert_eq!(TaskStatus::from_stored(None), TaskStatus::Unknown);
    }

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_serializes_with_space() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = TaskOutcome::failed("boom");
        assert_eq!(outcome.status, TaskStatus::Failed);
        assert_eq!(outcome.task, "error");
        assert!(outcome.final_response.contains("boom"));
    }

    #[test]
    fn test_search_hit_missing_fields_default() {
        let hit: SearchHit = serde_json::from_str(r#"{"title":"Rome"}"#).unwrap();
        assert_eq!(hit.title, "Rome");
        assert!(hit.link.is_empty());
        assert!(hit.snippet.is_empty());
    }
}
