//! Typed repository over the document store.
//!
//! Translates between the dashboard's record structs and the raw JSON
//! documents, and owns the collection-level invariants: one live queue
//! entry per barcode, and no silent overwrite of catalog records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::warn;

use super::store::{collections, DocumentStore, StoreError};
use crate::models::{BarcodeRecord, BarcodeSource, CatalogRecord, StagingRecord};

/// Repository for the unfound queue, the catalog cache, and the staging
/// collection.
#[derive(Clone)]
pub struct CatalogRepository {
    store: Arc<dyn DocumentStore>,
}

impl CatalogRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn decode<T: serde::de::DeserializeOwned>(
        collection: &str,
        key: &str,
        value: Value,
    ) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed document {}/{}: {}", collection, key, e);
                None
            }
        }
    }

    // --- unfound queue ---

    /// Add a barcode to the unfound queue, or refresh the existing entry.
    ///
    /// Upsert semantics enforce the one-live-entry invariant: a repeat
    /// submission adopts the new source/provenance and resets the retry
    /// bookkeeping rather than creating a duplicate.
    pub async fn enqueue(
        &self,
        barcode: &str,
        source: BarcodeSource,
        device_id: Option<String>,
        location: Option<String>,
    ) -> Result<BarcodeRecord, StoreError> {
        let record = BarcodeRecord::new(barcode, source).with_device(device_id, location);
        self.store
            .set(
                collections::UNFOUND_BARCODES,
                barcode,
                serde_json::to_value(&record)?,
            )
            .await?;
        Ok(record)
    }

    /// All pending queue entries, in unspecified order.
    pub async fn pending_barcodes(&self) -> Result<Vec<BarcodeRecord>, StoreError> {
        let docs = self.store.scan(collections::UNFOUND_BARCODES).await?;
        Ok(docs
            .into_iter()
            .filter_map(|(key, value)| Self::decode(collections::UNFOUND_BARCODES, &key, value))
            .collect())
    }

    /// Number of entries currently queued.
    pub async fn queue_size(&self) -> Result<usize, StoreError> {
        Ok(self.store.scan(collections::UNFOUND_BARCODES).await?.len())
    }

    /// Per-source counts of queued barcodes.
    pub async fn queue_sources(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let mut counts = BTreeMap::new();
        for record in self.pending_barcodes().await? {
            *counts.entry(record.source.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Remove a queue entry; returns whether it existed.
    pub async fn remove_queued(&self, barcode: &str) -> Result<bool, StoreError> {
        self.store
            .delete(collections::UNFOUND_BARCODES, barcode)
            .await
    }

    // --- catalog cache ---

    /// Look up a resolved product by barcode.
    pub async fn catalog_get(&self, barcode: &str) -> Result<Option<CatalogRecord>, StoreError> {
        let doc = self.store.get(collections::BARCODE_CACHE, barcode).await?;
        Ok(doc.and_then(|value| Self::decode(collections::BARCODE_CACHE, barcode, value)))
    }

    /// Whether a catalog record exists for the barcode.
    pub async fn catalog_exists(&self, barcode: &str) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get(collections::BARCODE_CACHE, barcode)
            .await?
            .is_some())
    }

    /// Write a catalog record. Callers must check existence first; the
    /// worker never overwrites a record that is already present.
    pub async fn catalog_put(&self, record: &CatalogRecord) -> Result<(), StoreError> {
        self.store
            .set(
                collections::BARCODE_CACHE,
                &record.barcode,
                serde_json::to_value(record)?,
            )
            .await
    }

    /// All catalog records still awaiting admin verification.
    pub async fn unverified_products(&self) -> Result<Vec<CatalogRecord>, StoreError> {
        let docs = self
            .store
            .query(collections::BARCODE_CACHE, "verified", &json!(false))
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|(key, value)| Self::decode(collections::BARCODE_CACHE, &key, value))
            .collect())
    }

    /// Mark catalog records as verified and drop their staging entries.
    ///
    /// Returns the number of records actually verified; barcodes with no
    /// catalog record are skipped rather than failing the batch.
    pub async fn verify_barcodes(&self, barcodes: &[String]) -> Result<usize, StoreError> {
        let mut verified = 0;
        for barcode in barcodes {
            let Some(mut record) = self.catalog_get(barcode).await? else {
                continue;
            };
            record.mark_verified();

            let mut fields = Map::new();
            fields.insert("verified".to_string(), json!(true));
            fields.insert(
                "verifiedAt".to_string(),
                serde_json::to_value(record.verified_at)?,
            );
            fields.insert("source".to_string(), json!(record.source.as_str()));
            self.store
                .update(collections::BARCODE_CACHE, barcode, fields)
                .await?;

            self.staging_delete_by_barcode(barcode).await?;
            verified += 1;
        }
        Ok(verified)
    }

    // --- recently-added staging ---

    /// Add a staging entry for the review tab.
    pub async fn staging_add(&self, record: &StagingRecord) -> Result<(), StoreError> {
        self.store
            .set(
                collections::RECENTLY_ADDED,
                &record.id,
                serde_json::to_value(record)?,
            )
            .await
    }

    /// All staging entries, newest submissions included.
    pub async fn staging_list(&self) -> Result<Vec<StagingRecord>, StoreError> {
        let docs = self.store.scan(collections::RECENTLY_ADDED).await?;
        Ok(docs
            .into_iter()
            .filter_map(|(key, value)| Self::decode(collections::RECENTLY_ADDED, &key, value))
            .collect())
    }

    /// Remove staging entries by id; returns how many were removed.
    pub async fn staging_clear(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut cleared = 0;
        for id in ids {
            if self.store.delete(collections::RECENTLY_ADDED, id).await? {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Remove any staging entries mirroring the given barcode.
    pub async fn staging_delete_by_barcode(&self, barcode: &str) -> Result<usize, StoreError> {
        let hits = self
            .store
            .query(collections::RECENTLY_ADDED, "barcode", &json!(barcode))
            .await?;
        let ids: Vec<String> = hits.into_iter().map(|(id, _)| id).collect();
        self.staging_clear(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{CatalogSource, PLACEHOLDER_IMAGE_URL};
    use crate::repository::MemoryStore;

    fn repo() -> CatalogRepository {
        CatalogRepository::new(Arc::new(MemoryStore::new()))
    }

    fn catalog_record(barcode: &str) -> CatalogRecord {
        CatalogRecord {
            barcode: barcode.to_string(),
            name: "Test Product".into(),
            price: "₹25".into(),
            mrp: "₹25".into(),
            image: PLACEHOLDER_IMAGE_URL.into(),
            brand: String::new(),
            category: String::new(),
            description: String::new(),
            verified: false,
            source: CatalogSource::BackgroundProcessor,
            created_at: Utc::now(),
            scraped_at: Some(Utc::now()),
            verified_at: None,
            original_unfound_id: Some(barcode.to_string()),
            recently_added_id: None,
        }
    }

    #[tokio::test]
    async fn enqueue_twice_keeps_one_entry_with_latest_fields() {
        let repo = repo();
        repo.enqueue("8901234567890", BarcodeSource::BulkImport, None, None)
            .await
            .unwrap();
        repo.enqueue(
            "8901234567890",
            BarcodeSource::DeviceReport,
            Some("pos-1".into()),
            None,
        )
        .await
        .unwrap();

        let pending = repo.pending_barcodes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source, BarcodeSource::DeviceReport);
        assert_eq!(pending[0].retry_count, 0);
        assert_eq!(pending[0].device_id.as_deref(), Some("pos-1"));
    }

    #[tokio::test]
    async fn queue_sources_counts_by_origin() {
        let repo = repo();
        repo.enqueue("1", BarcodeSource::Manual, None, None)
            .await
            .unwrap();
        repo.enqueue("2", BarcodeSource::BulkImport, None, None)
            .await
            .unwrap();
        repo.enqueue("3", BarcodeSource::BulkImport, None, None)
            .await
            .unwrap();

        let counts = repo.queue_sources().await.unwrap();
        assert_eq!(counts.get("manual"), Some(&1));
        assert_eq!(counts.get("bulk_import"), Some(&2));
    }

    #[tokio::test]
    async fn catalog_roundtrip_and_existence() {
        let repo = repo();
        assert!(!repo.catalog_exists("123").await.unwrap());
        repo.catalog_put(&catalog_record("123")).await.unwrap();
        assert!(repo.catalog_exists("123").await.unwrap());

        let fetched = repo.catalog_get("123").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Test Product");
        assert!(!fetched.verified);
    }

    #[tokio::test]
    async fn verify_flips_flag_and_clears_staging() {
        let repo = repo();
        let record = catalog_record("123");
        repo.catalog_put(&record).await.unwrap();
        repo.staging_add(&StagingRecord::from_catalog(&record))
            .await
            .unwrap();

        let verified = repo.verify_barcodes(&["123".to_string()]).await.unwrap();
        assert_eq!(verified, 1);

        let fetched = repo.catalog_get("123").await.unwrap().unwrap();
        assert!(fetched.verified);
        assert!(fetched.verified_at.is_some());
        assert_eq!(fetched.source, CatalogSource::BackgroundProcessorVerified);
        assert!(repo.staging_list().await.unwrap().is_empty());
        assert!(repo.unverified_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_skips_unknown_barcodes() {
        let repo = repo();
        let verified = repo
            .verify_barcodes(&["missing".to_string()])
            .await
            .unwrap();
        assert_eq!(verified, 0);
    }

    #[tokio::test]
    async fn unverified_query_excludes_verified() {
        let repo = repo();
        repo.catalog_put(&catalog_record("1")).await.unwrap();
        let mut verified = catalog_record("2");
        verified.mark_verified();
        repo.catalog_put(&verified).await.unwrap();

        let unverified = repo.unverified_products().await.unwrap();
        assert_eq!(unverified.len(), 1);
        assert_eq!(unverified[0].barcode, "1");
    }

    #[tokio::test]
    async fn staging_clear_reports_removed_count() {
        let repo = repo();
        let record = catalog_record("9");
        let staged = StagingRecord::from_catalog(&record);
        repo.staging_add(&staged).await.unwrap();

        let cleared = repo
            .staging_clear(&[staged.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(cleared, 1);
    }
}
