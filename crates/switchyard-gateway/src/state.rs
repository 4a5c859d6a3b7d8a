use std::sync::Arc;

use switchyard_agent::TaskService;
use switchyard_core::config::GatewayConfig;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub service: Arc<TaskService>,
}
