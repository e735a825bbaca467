use crate::{controller::health_check_controller, sse, AppState};
use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Shiftboard Real-time API"
        ),
        paths(
            health_check_controller::health_check,
            sse::handler::sse_handler,
        ),
        tags(
            (name = "shiftboard", description = "Real-time shift, coverage and lock notifications")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(sse_routes(app_state))
        // **** FIXME: protect the OpenAPI web UI
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

/// Server-sent event stream. Deciding which scopes a caller may subscribe to
/// belongs to the authorization layer in front of this router.
fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", get(sse::handler::sse_handler))
        .with_state(app_state)
}
