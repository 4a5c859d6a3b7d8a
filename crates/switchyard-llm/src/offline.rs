use futures::future::BoxFuture;

use switchyard_core::error::Result;
use switchyard_core::traits::Generator;
use switchyard_core::types::{GenerationRequest, Purpose, Strategy, TaskClassification};

/// Rationale recorded when classification runs without a model.
pub const OFFLINE_CHOICE_SUMMARY: &str = "default choice when no llm is used";

/// Deterministic stand-in response for a strategy.
pub fn placeholder_response(strategy: Strategy) -> String {
    format!("Hi, I am the {} task agent!", strategy)
}

/// Generator used when no model is configured. Never makes a network call.
#[derive(Debug, Default, Clone)]
pub struct OfflineGenerator;

impl OfflineGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for OfflineGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    fn invoke(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        let text = match request.purpose {
            Purpose::Respond(strategy) => placeholder_response(strategy),
            // Search the raw prompt as-is
            Purpose::SearchQuery => request.input,
        };
        Box::pin(async move { Ok(text) })
    }

    fn invoke_structured(&self, _prompt: String) -> BoxFuture<'_, Result<TaskClassification>> {
        Box::pin(async {
            Ok(TaskClassification {
                task: Strategy::General,
                choice_summary: OFFLINE_CHOICE_SUMMARY.to_string(),
            })
        })
    }
}
