use futures::future::BoxFuture;
use serde_json::json;

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::SearchProvider;
use switchyard_core::types::SearchHit;

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearch {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: &str, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| TAVILY_URL.to_string()),
            http: reqwest::Client::new(),
        }
    }
}

pub(crate) fn parse_results(body: &serde_json::Value, top_k: usize) -> Vec<SearchHit> {
    body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .take(top_k)
                .map(|r| SearchHit {
                    title: r["title"].as_str().unwrap_or("").to_string(),
                    link: r["url"].as_str().unwrap_or("").to_string(),
                    snippet: r["content"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &str, top_k: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.base_url)
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": top_k,
                }))
                .send()
                .await
                .map_err(|e| SwitchyardError::Search(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(SwitchyardError::Search(format!("HTTP {}: {}", status, body)));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| SwitchyardError::Search(e.to_string()))?;

            Ok(parse_results(&body, top_k))
        })
    }
}
