pub mod offline;
pub mod providers;
pub mod retry;

use std::sync::Arc;

use tracing::info;

use switchyard_core::config::ModelConfig;
use switchyard_core::traits::Generator;

pub use offline::{placeholder_response, OfflineGenerator};
pub use providers::openai::OpenAiGenerator;
pub use retry::RetryingGenerator;

/// Select the generation capability once, at construction time.
///
/// `None` (no model configured, or the model disabled) yields the offline
/// generator, which keeps every node fully functional with deterministic output.
pub fn create_generator(config: Option<&ModelConfig>) -> Arc<dyn Generator> {
    let Some(config) = config else {
        info!("No model configured, running with the offline generator");
        return Arc::new(OfflineGenerator::new());
    };

    // Every provider is reached through the OpenAI-compatible API
    let client = OpenAiGenerator::new(config.clone());
    info!(provider = %config.provider, model = %config.model_id, "Using model");

    match &config.retry {
        Some(retry) => Arc::new(RetryingGenerator::new(Box::new(client), retry.clone())),
        None => Arc::new(client),
    }
}
