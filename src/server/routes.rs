//! Router configuration for the control server.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the router with the worker-control contract.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Worker control
        .route("/api/processor/status", get(handlers::processor_status))
        .route("/api/processor/start", post(handlers::processor_start))
        .route("/api/processor/stop", post(handlers::processor_stop))
        .route("/api/processor/run-now", post(handlers::processor_run_now))
        .route("/api/processor/history", get(handlers::processor_history))
        .route(
            "/api/processor/history/clear",
            post(handlers::processor_clear_history),
        )
        // Unfound queue
        .route(
            "/api/unfound-barcodes",
            get(handlers::unfound_list).post(handlers::unfound_create),
        )
        .route(
            "/api/unfound-barcodes/sources",
            get(handlers::unfound_sources),
        )
        .route(
            "/api/unfound-barcodes/:barcode",
            delete(handlers::unfound_delete),
        )
        // Verification workflow
        .route("/api/products/unverified", get(handlers::products_unverified))
        .route("/api/products/verify", post(handlers::products_verify))
        .route("/api/recently-added", get(handlers::recently_added_list))
        .route(
            "/api/recently-added/clear",
            post(handlers::recently_added_clear),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
