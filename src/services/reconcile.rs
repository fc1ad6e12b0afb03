//! State-transition policy for one processed barcode.
//!
//! Applies the outcome of an extraction attempt to the three
//! collections. The catalog write and queue delete are not covered by a
//! cross-document transaction; a crash between them leaves a resolved
//! barcode enqueued, and the existence check on the next pass turns that
//! into a no-op delete instead of a duplicate record.

use chrono::Utc;

use crate::models::{BarcodeRecord, CatalogRecord, CatalogSource, StagingRecord};
use crate::repository::{CatalogRepository, StoreError};
use crate::scrapers::Extraction;

/// How a barcode's queue entry was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Extraction succeeded; a provisional catalog record was written.
    Resolved { name: String },
    /// A catalog record already existed; the stale queue entry was dropped.
    AlreadyCached,
    /// Definitively not found; the queue entry was deleted. Re-discovery
    /// requires external re-submission.
    Abandoned,
}

/// Applies reconciliation policy against the persistence layer.
#[derive(Clone)]
pub struct Reconciler {
    repo: CatalogRepository,
}

impl Reconciler {
    pub fn new(repo: CatalogRepository) -> Self {
        Self { repo }
    }

    /// Settle one barcode given its extraction result.
    pub async fn reconcile(
        &self,
        record: &BarcodeRecord,
        extraction: &Extraction,
    ) -> Result<Outcome, StoreError> {
        match extraction {
            Extraction::Found(product) => {
                // Never overwrite an existing catalog record; the queue
                // entry is stale and just gets dropped.
                if self.repo.catalog_exists(&record.barcode).await? {
                    self.repo.remove_queued(&record.barcode).await?;
                    return Ok(Outcome::AlreadyCached);
                }

                let now = Utc::now();
                let name = product
                    .name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string());
                let price = product.price.clone().unwrap_or_else(|| "N/A".to_string());

                let mut catalog = CatalogRecord {
                    barcode: record.barcode.clone(),
                    name: name.clone(),
                    price: price.clone(),
                    mrp: price,
                    image: product.image.clone(),
                    brand: String::new(),
                    category: String::new(),
                    description: String::new(),
                    verified: false,
                    source: CatalogSource::BackgroundProcessor,
                    created_at: now,
                    scraped_at: Some(now),
                    verified_at: None,
                    original_unfound_id: Some(record.barcode.clone()),
                    recently_added_id: None,
                };

                let staging = StagingRecord::from_catalog(&catalog);
                catalog.recently_added_id = Some(staging.id.clone());

                self.repo.catalog_put(&catalog).await?;
                self.repo.staging_add(&staging).await?;
                self.repo.remove_queued(&record.barcode).await?;

                Ok(Outcome::Resolved { name })
            }
            Extraction::NotFound => {
                // Delete-on-failure: once judged unfound on a pass, the
                // barcode is not retried automatically.
                self.repo.remove_queued(&record.barcode).await?;
                Ok(Outcome::Abandoned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::BarcodeSource;
    use crate::repository::MemoryStore;
    use crate::scrapers::ExtractedProduct;

    fn setup() -> (CatalogRepository, Reconciler) {
        let repo = CatalogRepository::new(Arc::new(MemoryStore::new()));
        let reconciler = Reconciler::new(repo.clone());
        (repo, reconciler)
    }

    fn found(barcode: &str) -> Extraction {
        Extraction::Found(ExtractedProduct {
            barcode: barcode.to_string(),
            name: Some("Maggi Noodles".to_string()),
            price: Some("₹14".to_string()),
            image: "https://cdn.example.org/maggi.png".to_string(),
        })
    }

    #[tokio::test]
    async fn success_writes_catalog_and_staging_and_dequeues() {
        let (repo, reconciler) = setup();
        let record = repo
            .enqueue("8901234567890", BarcodeSource::BulkImport, None, None)
            .await
            .unwrap();

        let outcome = reconciler
            .reconcile(&record, &found("8901234567890"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Resolved {
                name: "Maggi Noodles".to_string()
            }
        );

        let catalog = repo.catalog_get("8901234567890").await.unwrap().unwrap();
        assert!(!catalog.verified);
        assert_eq!(catalog.source, CatalogSource::BackgroundProcessor);
        assert_eq!(catalog.price, "₹14");
        assert_eq!(catalog.mrp, "₹14");
        assert_eq!(
            catalog.original_unfound_id.as_deref(),
            Some("8901234567890")
        );

        let staging = repo.staging_list().await.unwrap();
        assert_eq!(staging.len(), 1);
        assert_eq!(catalog.recently_added_id.as_deref(), Some(staging[0].id.as_str()));
        assert_eq!(repo.queue_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_under_reentry() {
        let (repo, reconciler) = setup();
        let record = repo
            .enqueue("8901234567890", BarcodeSource::Manual, None, None)
            .await
            .unwrap();

        let first = reconciler
            .reconcile(&record, &found("8901234567890"))
            .await
            .unwrap();
        assert!(matches!(first, Outcome::Resolved { .. }));

        // Simulate a crash-retry: the same barcode is enqueued again and
        // reconciled a second time.
        let record = repo
            .enqueue("8901234567890", BarcodeSource::Manual, None, None)
            .await
            .unwrap();
        let second = reconciler
            .reconcile(&record, &found("8901234567890"))
            .await
            .unwrap();
        assert_eq!(second, Outcome::AlreadyCached);

        // Exactly one catalog record and one staging entry; the stale
        // queue entry is gone.
        assert!(repo.catalog_exists("8901234567890").await.unwrap());
        assert_eq!(repo.staging_list().await.unwrap().len(), 1);
        assert_eq!(repo.queue_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn existing_catalog_record_is_never_overwritten() {
        let (repo, reconciler) = setup();
        let record = repo
            .enqueue("8901234567890", BarcodeSource::Manual, None, None)
            .await
            .unwrap();

        // A manually entered record predates the worker's attempt.
        reconciler
            .reconcile(&record, &found("8901234567890"))
            .await
            .unwrap();
        let original_name = repo
            .catalog_get("8901234567890")
            .await
            .unwrap()
            .unwrap()
            .name;

        let record = repo
            .enqueue("8901234567890", BarcodeSource::Manual, None, None)
            .await
            .unwrap();
        let conflicting = Extraction::Found(ExtractedProduct {
            barcode: "8901234567890".to_string(),
            name: Some("Different Name".to_string()),
            price: None,
            image: "https://cdn.example.org/other.png".to_string(),
        });
        reconciler.reconcile(&record, &conflicting).await.unwrap();

        let kept = repo.catalog_get("8901234567890").await.unwrap().unwrap();
        assert_eq!(kept.name, original_name);
    }

    #[tokio::test]
    async fn not_found_deletes_queue_entry_without_catalog_write() {
        let (repo, reconciler) = setup();
        let record = repo
            .enqueue("9999999999993", BarcodeSource::BulkImport, None, None)
            .await
            .unwrap();

        let outcome = reconciler
            .reconcile(&record, &Extraction::NotFound)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Abandoned);
        assert_eq!(repo.queue_size().await.unwrap(), 0);
        assert!(!repo.catalog_exists("9999999999993").await.unwrap());
        assert!(repo.staging_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_fields_default_on_the_catalog_record() {
        let (repo, reconciler) = setup();
        let record = repo
            .enqueue("8901234567890", BarcodeSource::Manual, None, None)
            .await
            .unwrap();

        let price_only = Extraction::Found(ExtractedProduct {
            barcode: "8901234567890".to_string(),
            name: None,
            price: Some("₹55".to_string()),
            image: "https://cdn.example.org/x.png".to_string(),
        });
        let outcome = reconciler.reconcile(&record, &price_only).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Resolved {
                name: "Unknown".to_string()
            }
        );

        let catalog = repo.catalog_get("8901234567890").await.unwrap().unwrap();
        assert_eq!(catalog.name, "Unknown");
        assert_eq!(catalog.price, "₹55");
    }
}
