//! Router configuration - centralized route definitions.
//!
//! Routes are split into public (health, metrics - never rate limited so
//! probes and scrapers always get through) and API routes (rate limited
//! and concurrency limited by the caller).

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;
use super::{classify, health};

/// Build the public routes (health checks, metrics)
pub fn build_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        .route("/metrics", get(health::metrics_endpoint))
        .with_state(state)
}

/// Build the API routes
///
/// Rate limiting and concurrency limits should be applied by the caller.
pub fn build_api_routes(state: AppState) -> Router {
    Router::new()
        .route("/classify", post(classify::classify))
        .with_state(state)
}

/// Build the complete router with both route groups.
///
/// Note: this does NOT apply rate limiting or other layers; main.rs does.
pub fn build_router(state: AppState) -> Router {
    let public = build_public_routes(state.clone());
    let api = build_api_routes(state);

    Router::new().merge(public).merge(api)
}
