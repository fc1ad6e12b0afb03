//! Queue, catalog, and staging records.
//!
//! These are the document shapes stored in the three persistent
//! collections. Field names serialize in camelCase to stay compatible
//! with documents written by earlier deployments of the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder image used when nothing could be extracted or synthesized.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://via.placeholder.com/300x300/cccccc/666666?text=Add+Image";

/// Where an unfound barcode was reported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeSource {
    /// Added by an admin through the dashboard.
    Manual,
    /// Added by a spreadsheet import job.
    BulkImport,
    /// Reported by a point-of-sale device that failed a lookup.
    DeviceReport,
}

impl BarcodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::BulkImport => "bulk_import",
            Self::DeviceReport => "device_report",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "bulk_import" => Some(Self::BulkImport),
            "device_report" => Some(Self::DeviceReport),
            _ => None,
        }
    }
}

/// Queue entry lifecycle state. Only `pending` exists today; resolved
/// entries are deleted rather than transitioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Pending,
}

/// An unresolved barcode awaiting a scraping attempt.
///
/// Keyed by the barcode value itself, which enforces the one-live-entry
/// invariant: re-submission upserts the existing document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeRecord {
    pub barcode: String,
    pub source: BarcodeSource,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_retry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: QueueStatus,
    /// Reporting device, when the source is a device lookup failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Free-form store/location tag supplied by the reporting device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl BarcodeRecord {
    /// Create a fresh queue entry with reset retry bookkeeping.
    pub fn new(barcode: &str, source: BarcodeSource) -> Self {
        Self {
            barcode: barcode.to_string(),
            source,
            created_at: Utc::now(),
            retry_count: 0,
            last_retry: None,
            status: QueueStatus::Pending,
            device_id: None,
            location: None,
        }
    }

    /// Attach device provenance for device-reported barcodes.
    pub fn with_device(mut self, device_id: Option<String>, location: Option<String>) -> Self {
        self.device_id = device_id;
        self.location = location;
        self
    }
}

/// Provenance of a catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    /// Written by the background worker, pending admin review.
    BackgroundProcessor,
    /// Promoted from staging by an admin verification.
    BackgroundProcessorVerified,
    /// Entered by hand in the dashboard.
    Manual,
    /// Imported from a legacy products collection.
    Migrated,
}

impl CatalogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackgroundProcessor => "background_processor",
            Self::BackgroundProcessorVerified => "background_processor_verified",
            Self::Manual => "manual",
            Self::Migrated => "migrated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "background_processor" => Some(Self::BackgroundProcessor),
            "background_processor_verified" => Some(Self::BackgroundProcessorVerified),
            "manual" => Some(Self::Manual),
            "migrated" => Some(Self::Migrated),
            _ => None,
        }
    }
}

/// A resolved product, keyed by barcode in the catalog cache.
///
/// The worker only ever creates these with `verified = false`; the
/// verified flag is flipped by the admin verification flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub barcode: String,
    pub name: String,
    pub price: String,
    pub mrp: String,
    pub image: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub verified: bool,
    pub source: CatalogSource,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// Barcode of the queue entry this record resolved, for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_unfound_id: Option<String>,
    /// Staging record id, when a companion staging entry was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recently_added_id: Option<String>,
}

impl CatalogRecord {
    /// Mark as admin-verified, stamping the verification time.
    pub fn mark_verified(&mut self) {
        self.verified = true;
        self.verified_at = Some(Utc::now());
        if self.source == CatalogSource::BackgroundProcessor {
            self.source = CatalogSource::BackgroundProcessorVerified;
        }
    }
}

/// A "recently added" staging entry backing the verify-then-promote
/// review tab. Keyed by a generated id; removed on promote or clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingRecord {
    pub id: String,
    pub barcode: String,
    pub name: String,
    pub price: String,
    pub mrp: String,
    pub image: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub source: CatalogSource,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_unfound_id: Option<String>,
}

impl StagingRecord {
    /// Build a staging entry mirroring a freshly written catalog record.
    pub fn from_catalog(record: &CatalogRecord) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            barcode: record.barcode.clone(),
            name: record.name.clone(),
            price: record.price.clone(),
            mrp: record.mrp.clone(),
            image: record.image.clone(),
            brand: record.brand.clone(),
            category: record.category.clone(),
            description: record.description.clone(),
            source: record.source,
            added_at: record.created_at,
            original_unfound_id: record.original_unfound_id.clone(),
        }
    }
}
