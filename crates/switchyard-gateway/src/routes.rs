use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{debug, error, warn};

use switchyard_agent::StatusResponse;
use switchyard_core::error::SwitchyardError;

use crate::state::AppState;

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "API is running.",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
pub struct ExecuteBody {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

// POST /v1/agent/execute (202 with the queued task id, 503 when the queue is full)
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteBody>,
) -> Response {
    match state
        .service
        .submit(&body.task, body.thread_id.as_deref())
        .await
    {
        Ok(resp) => (StatusCode::ACCEPTED, Json(resp)).into_response(),
        Err(SwitchyardError::InvalidInput(msg)) => {
            debug!(error = %msg, "Rejected task submission");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "detail": msg })),
            )
                .into_response()
        }
        Err(SwitchyardError::Queue(msg)) => {
            warn!(error = %msg, "Task queue unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "detail": msg })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Task submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub task_id: String,
}

// GET /v1/agent/status?task_id=...
// Never 404s, unknown ids read as "Unknown"
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StatusQuery>,
) -> Json<StatusResponse> {
    Json(state.service.status(&q.task_id).await)
}
