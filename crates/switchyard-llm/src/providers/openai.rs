use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use switchyard_core::config::ModelConfig;
use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::Generator;
use switchyard_core::types::{GenerationRequest, Strategy, TaskClassification};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiGenerator {
    http: Client,
    config: ModelConfig,
}

impl OpenAiGenerator {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    async fn complete(
        &self,
        prompt: String,
        response_format: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

        let body = ChatRequest {
            model: self.config.model_id.clone(),
            messages: vec![OaiMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: if self.config.temperature > 0.0 {
                Some(self.config.temperature)
            } else {
                None
            },
            response_format,
        };

        let mut req = self.http.post(url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| SwitchyardError::Generation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(SwitchyardError::Generation(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SwitchyardError::GenerationParse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SwitchyardError::GenerationParse("response had no content".into()))
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// JSON-schema response format restricting output to a task classification.
pub(crate) fn classification_format() -> serde_json::Value {
    let tags: Vec<&str> = Strategy::ALL.iter().map(|s| s.as_str()).collect();
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "task_classification",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "task": { "type": "string", "enum": tags },
                    "choice_summary": { "type": "string" }
                },
                "required": ["task", "choice_summary"],
                "additionalProperties": false
            }
        }
    })
}

/// Parse the model's structured answer. A missing or unknown `task` falls
/// back to the default strategy instead of failing.
pub(crate) fn parse_classification(text: &str) -> Result<TaskClassification> {
    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| SwitchyardError::GenerationParse(format!("classification: {}", e)))?;

    let task = match value["task"].as_str().map(str::parse::<Strategy>) {
        Some(Ok(task)) => task,
        other => {
            warn!(
                raw = %value["task"],
                parsed = other.is_some(),
                "Unusable task tag, using default strategy"
            );
            Strategy::default()
        }
    };

    Ok(TaskClassification {
        task,
        choice_summary: value["choice_summary"].as_str().unwrap_or_default().to_string(),
    })
}

impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn invoke(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            debug!(purpose = ?request.purpose, "Generation request");
            self.complete(request.prompt, None).await
        })
    }

    fn invoke_structured(&self, prompt: String) -> BoxFuture<'_, Result<TaskClassification>> {
        Box::pin(async move {
            let text = self.complete(prompt, Some(classification_format())).await?;
            parse_classification(&text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classification() {
        let c = parse_classification(r#"{"task":"summarize","choice_summary":"long text"}"#)
            .unwrap();
        assert_eq!(c.task, Strategy::Summarize);
        assert_eq!(c.choice_summary, "long text");
    }

    #[test]
    fn test_parse_classification_unknown_tag_defaults() {
        let c = parse_classification(r#"{"task":"poetry","choice_summary":"?"}"#).unwrap();
        assert_eq!(c.task, Strategy::General);
    }

    #[test]
    fn test_parse_classification_missing_tag_defaults() {
        let c = parse_classification(r#"{"choice_summary":"no tag"}"#).unwrap();
        assert_eq!(c.task, Strategy::General);
        assert_eq!(c.choice_summary, "no tag");
    }

    #[test]
    fn test_parse_classification_not_json() {
        assert!(matches!(
            parse_classification("general"),
            Err(SwitchyardError::GenerationParse(_))
        ));
    }

    #[test]
    fn test_classification_format_lists_all_tags() {
        let format = classification_format();
        let tags = &format["json_schema"]["schema"]["properties"]["task"]["enum"];
        assert_eq!(tags.as_array().unwrap().len(), 4);
        assert_eq!(tags[3], "content");
    }

    #[test]
    fn test_request_omits_zero_temperature() {
        let body = ChatRequest {
            model: "gpt-4.1".into(),
            messages: vec![],
            max_tokens: 16,
            temperature: None,
            response_format: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("temperature"));
        assert!(!json.contains("response_format"));
    }
}
