//! In-memory worker status and processing history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the background worker's progress.
///
/// Owned by the worker, read concurrently by the status endpoint. Not
/// persisted; lost on process restart by design.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub processed_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub current_barcode: Option<String>,
}

impl ProcessingStatus {
    /// Reset the per-run counters at worker start.
    pub fn reset_for_run(&mut self) {
        self.running = true;
        self.last_run = Some(Utc::now());
        self.processed_count = 0;
        self.success_count = 0;
        self.error_count = 0;
        self.current_barcode = None;
    }
}

/// One processing outcome, recorded in the bounded history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub barcode: String,
    pub product_name: Option<String>,
    pub success: bool,
    pub processed_at: DateTime<Utc>,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    /// Record a successful resolution.
    pub fn resolved(barcode: &str, name: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            product_name: Some(name.to_string()),
            success: true,
            processed_at: Utc::now(),
            result: format!("Added: {}", name),
            error: None,
        }
    }

    /// Record a definitive not-found outcome.
    pub fn abandoned(barcode: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            product_name: None,
            success: false,
            processed_at: Utc::now(),
            result: "Deleted - Not Found".to_string(),
            error: Some("Product not found on lookup site - removed from unfound list".to_string()),
        }
    }

    /// Record a barcode skipped because the catalog already has it.
    pub fn already_cached(barcode: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            product_name: None,
            success: true,
            processed_at: Utc::now(),
            result: "Skipped - Already Cached".to_string(),
            error: None,
        }
    }

    /// Record a per-item error (fetch, store, or anything unexpected).
    pub fn failed(barcode: &str, error: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            product_name: None,
            success: false,
            processed_at: Utc::now(),
            result: "Error".to_string(),
            error: Some(error.to_string()),
        }
    }
}
