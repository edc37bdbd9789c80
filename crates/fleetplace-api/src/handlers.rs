//! REST API handlers.
//!
//! Each handler calls into `PlacementService` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use fleetplace_scheduler::{SchedulerError, SubmitPlacement};
use fleetplace_state::{StateError, TaskPatch};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn scheduler_error(e: SchedulerError) -> Response {
    let status = match &e {
        SchedulerError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SchedulerError::State(StateError::IllegalTransition { .. }) => StatusCode::CONFLICT,
        SchedulerError::State(StateError::InvalidPatch(_)) => StatusCode::BAD_REQUEST,
        SchedulerError::WaitTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SchedulerError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %e, "placement request failed");
    }
    error_response(&e.to_string(), status).into_response()
}

// ── Placements ─────────────────────────────────────────────────

/// POST /api/v1/placements
pub async fn submit_placement(
    State(state): State<ApiState>,
    Json(submit): Json<SubmitPlacement>,
) -> impl IntoResponse {
    match state.service.submit(submit).await {
        Ok(task) if task.is_terminal() => (StatusCode::OK, ApiResponse::ok(task)).into_response(),
        Ok(task) => (StatusCode::ACCEPTED, ApiResponse::ok(task)).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// GET /api/v1/placements
pub async fn list_placements(State(state): State<ApiState>) -> impl IntoResponse {
    match state.service.list() {
        Ok(tasks) => ApiResponse::ok(tasks).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// GET /api/v1/placements/{id}
pub async fn get_placement(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.get(&id) {
        Ok(task) => ApiResponse::ok(task).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// PATCH /api/v1/placements/{id}
pub async fn patch_placement(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> impl IntoResponse {
    match state.service.patch(&id, &patch).await {
        Ok(task) => ApiResponse::ok(task).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// POST /api/v1/placements/{id}/cancel
pub async fn cancel_placement(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.cancel(&id).await {
        Ok(task) => ApiResponse::ok(task).into_response(),
        Err(e) => scheduler_error(e),
    }
}
