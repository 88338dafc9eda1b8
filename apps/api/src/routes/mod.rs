pub mod health;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::enhancement::handlers;
use crate::quota::handlers as quota_handlers;
use crate::state::AppState;
use crate::telemetry::metrics_handler;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Routes plus request tracing. An incoming `x-request-id` is kept, otherwise
/// a UUID is assigned; either way it is on the span and echoed on the response.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/resumes/:id/enhance",
            post(handlers::handle_enhance),
        )
        .route("/api/v1/user/tier", get(quota_handlers::handle_tier))
        .route("/api/v1/user/usage", get(quota_handlers::handle_usage))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id
    )
}
