pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Criteria API
        .route(
            "/api/v1/criteria/generate",
            post(handlers::handle_generate_criteria),
        )
        .route(
            "/api/v1/criteria/finalize",
            post(handlers::handle_finalize_criteria),
        )
        // Evaluation API
        .route("/api/v1/evaluate", post(handlers::handle_evaluate))
        .route(
            "/api/v1/evaluate/export",
            post(handlers::handle_export_csv),
        )
        // Legacy ranking
        .route("/api/v1/rank", post(handlers::handle_rank))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
