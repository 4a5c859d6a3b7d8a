use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use switchyard_agent::TaskService;
use switchyard_core::config::GatewayConfig;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    service: Arc<TaskService>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, service: Arc<TaskService>) -> Self {
        Self { config, service }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            service: self.service.clone(),
        });
        let app = router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

/// Build the application router. Paths are served with and without a
/// trailing slash.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/v1/agent/execute", post(routes::execute_task))
        .route("/v1/agent/execute/", post(routes::execute_task))
        .route("/v1/agent/status", get(routes::task_status))
        .route("/v1/agent/status/", get(routes::task_status))
        .route("/health", get(routes::health))
        .route("/health/", get(routes::health))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
