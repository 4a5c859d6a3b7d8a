use futures::future::BoxFuture;

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::SearchProvider;
use switchyard_core::types::SearchHit;

const GOOGLE_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Programmable Search (Custom Search JSON API).
pub struct GoogleSearch {
    api_key: String,
    engine_id: String,
    base_url: String,
    http: reqwest::Client,
}

impl GoogleSearch {
    pub fn new(api_key: &str, engine_id: &str, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
            base_url: base_url.unwrap_or_else(|| GOOGLE_CSE_URL.to_string()),
            http: reqwest::Client::new(),
        }
    }
}

/// Map a Custom Search response body to hits, keeping rank order.
pub(crate) fn parse_results(body: &serde_json::Value, top_k: usize) -> Vec<SearchHit> {
    body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .take(top_k)
                .map(|item| SearchHit {
                    title: item["title"].as_str().unwrap_or("").to_string(),
                    link: item["link"].as_str().unwrap_or("").to_string(),
                    snippet: item["snippet"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SearchProvider for GoogleSearch {
    fn name(&self) -> &str {
        "google"
    }

    fn search(&self, query: &str, top_k: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            // The API serves at most 10 results per request
            let num = top_k.clamp(1, 10).to_string();

            let resp = self
                .http
                .get(&self.base_url)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("cx", self.engine_id.as_str()),
                    ("q", query.as_str()),
                    ("num", num.as_str()),
                ])
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_keeps_rank_and_limit() {
        let body = serde_json::json!({
            "items": [
                {"title": "A", "link": "https://a", "snippet": "first"},
                {"title": "B", "link": "https://b", "snippet": "second"},
                {"title": "C", "link": "https://c", "snippet": "third"}
            ]
        });
        let hits = parse_results(&body, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "A");
        assert_eq!(hits[1].link, "https://b");
    }

    #[test]
    fn test_parse_results_no_items() {
        let body = serde_json::json!({"searchInformation": {"totalResults": "0"}});
        assert!(parse_results(&body, 4).is_empty());
    }

    #[test]
    fn test_parse_results_missing_snippet() {
        let body = serde_json::json!({"items": [{"title": "A", "link": "https://a"}]});
        let hits = parse_results(&body, 4);
        assert_eq!(hits[0].snippet, "");
    }
}
