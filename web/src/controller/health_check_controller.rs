use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use log::*;

/// GET liveness of the API router
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API router is up and responding to requests", body = String),
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    if !app_state.broker.is_listening() {
        // Still serving local subscribers; cross-process events are not arriving.
        warn!("Health check: broker is not receiving from the event bus");
    }
    (StatusCode::OK, "healthy")
}
