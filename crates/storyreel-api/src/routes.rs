//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    create_job, delete_job, get_job_scene, get_job_status, get_usage, health, ready,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    ClientRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/:story_id", delete(delete_job))
        .route("/jobs/:story_id/status", get(get_job_status))
        .route("/jobs/:story_id/scenes/:index", get(get_job_scene));

    let usage_routes = Router::new().route("/usage", get(get_usage));

    let rate_limiter =
        ClientRateLimiter::new(state.config.rate_limit_rps, state.config.rate_limit_burst);

    let api_routes = Router::new()
        .merge(job_routes)
        .merge(usage_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let mut router = Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes);

    // Local blob store URLs point here
    if let Some(dir) = &state.config.media_dir {
        router = router.nest_service("/media", ServeDir::new(dir));
    }

    router
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
