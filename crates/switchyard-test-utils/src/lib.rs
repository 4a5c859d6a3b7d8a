//! Scripted and failing capability providers for tests.

use std::sync::Mutex;

use futures::future::BoxFuture;

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::{Generator, SearchProvider};
use switchyard_core::types::{
    GenerationRequest, Purpose, SearchHit, Strategy, TaskClassification,
};

/// Generator that always classifies as a fixed strategy and answers with
/// canned text. Every prompt it receives is recorded.
///
/// Classification always succeeds. `failing_invoke` makes every later
/// text generation fail, which exercises failures past the classifier.
pub struct ScriptedGenerator {
    strategy: Strategy,
    search_query: String,
    invoke_error: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            search_query: "scripted search query".to_string(),
            invoke_error: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer search-query derivation with `query` instead of the default.
    pub fn with_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }

    /// Fail every `invoke` with a generation error carrying `message`.
    pub fn failing_invoke(mut self, message: impl Into<String>) -> Self {
        self.invoke_error = Some(message.into());
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record(&self, prompt: &str) {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
    }
}

impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn invoke(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        self.record(&request.prompt);
        if let Some(message) = self.invoke_error.clone() {
            return Box::pin(async move { Err(SwitchyardError::Generation(message)) });
        }
        let text = match request.purpose {
            Purpose::Respond(strategy) => format!("scripted {} response", strategy),
            Purpose::SearchQuery => self.search_query.clone(),
        };
        Box::pin(async move { Ok(text) })
    }

    fn invoke_structured(&self, prompt: String) -> BoxFuture<'_, Result<TaskClassification>> {
        self.record(&prompt);
        let task = self.strategy;
        Box::pin(async move {
            Ok(TaskClassification {
                task,
                choice_summary: format!("scripted choice: {}", task),
            })
        })
    }
}

/// Generator whose every call fails with the given message.
pub struct FailingGenerator {
    message: String,
}

impl FailingGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    fn invoke(&self, _request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        let message = self.message.clone();
        Box::pin(async move { Err(SwitchyardError::Generation(message)) })
    }

    fn invoke_structured(&self, _prompt: String) -> BoxFuture<'_, Result<TaskClassification>> {
        let message = self.message.clone();
        Box::pin(async move { Err(SwitchyardError::Generation(message)) })
    }
}

/// Search provider returning a fixed result list regardless of the query.
pub struct StaticSearch {
    hits: Vec<SearchHit>,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// `n` hits titled `result i` with snippet `snippet i` and link
    /// `https://example.com/i`, starting at 1.
    pub fn numbered(n: usize) -> Self {
        Self::new(
            (1..=n)
                .map(|i| SearchHit {
                    title: format!("result {}", i),
                    link: format!("https://example.com/{}", i),
                    snippet: format!("snippet {}", i),
                })
                .collect(),
        )
    }
}

impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    /// Returns every configured hit; trimming to `top_k` is the caller's job.
    fn search(&self, _query: &str, _top_k: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let hits = self.hits.clone();
        Box::pin(async move { Ok(hits) })
    }
}

/// Search provider that always fails.
#[derive(Default)]
pub struct FailingSearch;

impl FailingSearch {
    pub fn new() -> Self {
        Self
    }
}

impl SearchProvider for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    fn search(&self, _query: &str, _top_k: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        Box::pin(async { Err(SwitchyardError::Search("search backend unavailable".to_string())) })
    }
}
