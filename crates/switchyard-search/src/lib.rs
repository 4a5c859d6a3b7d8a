pub mod google;
pub mod tavily;

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use switchyard_core::config::WebSearchConfig;
use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::SearchProvider;
use switchyard_core::types::SearchHit;

pub use google::GoogleSearch;
pub use tavily::TavilySearch;

/// Select the search capability once, at construction time.
pub fn create_search_provider(config: Option<&WebSearchConfig>) -> Arc<dyn SearchProvider> {
    let Some(config) = config else {
        info!("No web search configured, content searches will run without sources");
        return Arc::new(UnconfiguredSearch);
    };

    match config.provider.as_str() {
        "google" => match &config.engine_id {
            Some(cx) => Arc::new(GoogleSearch::new(&config.api_key, cx, config.base_url.clone())),
            None => {
                warn!("Google search needs web_search.engine_id, searches will fail");
                Arc::new(UnconfiguredSearch)
            }
        },
        "tavily" => Arc::new(TavilySearch::new(&config.api_key, config.base_url.clone())),
        other => {
            warn!(provider = %other, "Unsupported web search provider, searches will fail");
            Arc::new(UnconfiguredSearch)
        }
    }
}

/// Provider used when no search backend is set up. Every call fails.
pub struct UnconfiguredSearch;

impl SearchProvider for UnconfiguredSearch {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn search(&self, _query: &str, _top_k: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        Box::pin(async {
            Err(SwitchyardError::Search(
                "no web search provider configured".into(),
            ))
        })
    }
}
