use crate::model::HealthResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::warn;

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Storage probe.
pub async fn ping_handler(State(state): State<AppState>) -> StatusCode {
    match state.service().status().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "storage probe failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
