// ============================================================
// Inference Service — HTTP Surface (axum)
// ============================================================
// Routes, the request-telemetry middleware and the body limit.
//
// Every request, matched or not, passes through track_requests
// under its matched route template ("unmatched" for 404s). The
// counter moves before the handler runs, so requests still in
// flight show up in /metrics; latency is observed on completion.

pub mod handlers;
pub mod state;

use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

pub use state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const UNMATCHED: &str = "unmatched";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/predict", post(handlers::predict))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED.to_string(), |p| p.as_str().to_string());
    let started = Instant::now();
    state.metrics.record_request(&endpoint);

    let response = next.run(req).await;

    state.metrics.observe_latency(&endpoint, started.elapsed().as_secs_f64());
    response
}
