//! Route table.
//!
//! Wrong methods on known paths and unknown paths alike fall through to the
//! capability document; `OPTIONS` anywhere is answered by the CORS layer.

use crate::api::handlers::{
    chat_completions, health, image_generations, list_models, metrics_handler, service_info,
    AppState,
};
use crate::core::{request_id_middleware, MetricsMiddleware};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(chat_completions).fallback(service_info),
        )
        .route(
            "/v1/images/generations",
            post(image_generations).fallback(service_info),
        )
        .route("/v1/models", get(list_models).fallback(service_info))
        .route("/health", get(health).fallback(service_info))
        .route("/metrics", get(metrics_handler).fallback(service_info))
        .fallback(service_info)
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
