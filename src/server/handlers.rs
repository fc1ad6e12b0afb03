//! Endpoint handlers for the worker control contract.
//!
//! Every response is a structured JSON envelope; stack traces and raw
//! errors never leave the process.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::models::BarcodeSource;
use crate::repository::StoreError;
use crate::services::ProcessorError;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

fn store_error(e: StoreError) -> (StatusCode, Json<serde_json::Value>) {
    error!("Store operation failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "message": "database operation failed"})),
    )
}

/// Current worker status snapshot.
pub async fn processor_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.processor.status().await;
    Json(json!({"status": "success", "data": status}))
}

/// Start the continuous worker loop.
pub async fn processor_start(State(state): State<AppState>) -> impl IntoResponse {
    if state.processor.clone().start().await {
        Json(json!({
            "status": "success",
            "message": "Background processor started in continuous mode",
        }))
    } else {
        Json(json!({
            "status": "error",
            "message": "Background processor is already running",
        }))
    }
}

/// Request a graceful worker stop.
pub async fn processor_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.processor.stop().await;
    Json(json!({
        "status": "success",
        "message": "Background processor stop requested",
    }))
}

/// Immediate-drain trigger: reports the queue size when the loop is
/// already running, rejects otherwise.
pub async fn processor_run_now(State(state): State<AppState>) -> impl IntoResponse {
    match state.processor.run_now().await {
        Ok(0) => Json(json!({
            "status": "success",
            "message": "No unfound barcodes to process at this time",
            "barcodes_found": 0,
        }))
        .into_response(),
        Ok(found) => Json(json!({
            "status": "success",
            "message": format!(
                "Found {} barcodes to process. Processing will continue automatically.",
                found
            ),
            "barcodes_found": found,
        }))
        .into_response(),
        Err(e @ ProcessorError::NotRunning) => {
            Json(json!({"status": "error", "message": e.to_string()})).into_response()
        }
        Err(ProcessorError::Store(e)) => store_error(e).into_response(),
        Err(e) => Json(json!({"status": "error", "message": e.to_string()})).into_response(),
    }
}

/// Recent processing outcomes, oldest first.
pub async fn processor_history(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.processor.history().await;
    Json(json!({"status": "success", "data": history}))
}

pub async fn processor_clear_history(State(state): State<AppState>) -> impl IntoResponse {
    state.processor.clear_history().await;
    Json(json!({
        "status": "success",
        "message": "Processing history cleared",
    }))
}

/// All queued unfound barcodes.
pub async fn unfound_list(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.pending_barcodes().await {
        Ok(records) => Json(json!({
            "status": "success",
            "count": records.len(),
            "data": records,
        }))
        .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// Per-source counts of queued barcodes.
pub async fn unfound_sources(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.queue_sources().await {
        Ok(counts) => Json(json!({"status": "success", "data": counts})).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUnfoundRequest {
    pub barcode: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Enqueue a barcode (upsert: re-submission refreshes the existing
/// entry rather than duplicating it).
pub async fn unfound_create(
    State(state): State<AppState>,
    Json(request): Json<CreateUnfoundRequest>,
) -> impl IntoResponse {
    let barcode = request.barcode.trim();
    if barcode.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "Barcode is required"})),
        )
            .into_response();
    }

    let source = request
        .source
        .as_deref()
        .and_then(BarcodeSource::from_str)
        .unwrap_or(BarcodeSource::Manual);

    match state
        .repo
        .enqueue(barcode, source, request.device_id, request.location)
        .await
    {
        Ok(record) => (
            StatusCode::CREATED,
            Json(json!({
                "status": "success",
                "message": "Unfound barcode queued",
                "data": record,
            })),
        )
            .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// Drop a barcode from the queue.
pub async fn unfound_delete(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> impl IntoResponse {
    match state.repo.remove_queued(&barcode).await {
        Ok(existed) => Json(json!({
            "status": "success",
            "message": "Unfound barcode deleted",
            "existed": existed,
        }))
        .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// Catalog records still awaiting admin review.
pub async fn products_unverified(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.unverified_products().await {
        Ok(records) => Json(json!({
            "status": "success",
            "count": records.len(),
            "data": records,
        }))
        .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub barcodes: Vec<String>,
}

/// Admin verification: flip records to verified and drop their staging
/// entries.
pub async fn products_verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> impl IntoResponse {
    if request.barcodes.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "No barcodes provided"})),
        )
            .into_response();
    }

    match state.repo.verify_barcodes(&request.barcodes).await {
        Ok(verified) => Json(json!({
            "status": "success",
            "message": format!("Verified {} products", verified),
            "verifiedCount": verified,
        }))
        .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// Staging entries for the recently-added review tab.
pub async fn recently_added_list(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.staging_list().await {
        Ok(records) => Json(json!({
            "status": "success",
            "count": records.len(),
            "data": records,
        }))
        .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearStagingRequest {
    #[serde(rename = "productIds")]
    pub product_ids: Vec<String>,
}

/// Remove staging entries by id.
pub async fn recently_added_clear(
    State(state): State<AppState>,
    Json(request): Json<ClearStagingRequest>,
) -> impl IntoResponse {
    if request.product_ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "No product IDs provided"})),
        )
            .into_response();
    }

    match state.repo.staging_clear(&request.product_ids).await {
        Ok(cleared) => Json(json!({
            "status": "success",
            "message": format!("Cleared {} products", cleared),
            "clearedCount": cleared,
        }))
        .into_response(),
        Err(e) => store_error(e).into_response(),
    }
}
