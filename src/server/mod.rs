//! Control server for the acquisition worker.
//!
//! Exposes the narrow contract the admin dashboard needs: worker
//! start/stop/observe, queue mutation, and the verification workflow.
//! Worker errors never propagate to API callers; they surface through
//! the status and history endpoints only.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::repository::CatalogRepository;
use crate::scrapers::PageFetcher;
use crate::services::{Processor, ProcessorConfig};

/// Shared state for the control server.
#[derive(Clone)]
pub struct AppState {
    pub repo: CatalogRepository,
    pub processor: Arc<Processor>,
}

impl AppState {
    /// Build state from settings: open the store, wire the fetcher and
    /// the worker.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let repo = CatalogRepository::new(settings.open_store()?);
        let fetcher = PageFetcher::new(settings.fetcher.clone())
            .map_err(|e| anyhow::anyhow!("fetcher init: {}", e))?;
        let processor = Arc::new(Processor::new(
            repo.clone(),
            Arc::new(fetcher),
            ProcessorConfig::default(),
        ));
        Ok(Self { repo, processor })
    }
}

/// Start the control server, optionally auto-starting the worker.
pub async fn serve(settings: &Settings, autostart_worker: bool) -> anyhow::Result<()> {
    let state = AppState::from_settings(settings)?;

    if autostart_worker {
        state.processor.clone().start().await;
    }

    let processor = state.processor.clone();
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    tracing::info!("Starting control server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Bound the worker's exit instead of letting the runtime kill it.
    processor.shutdown().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::models::BarcodeSource;
    use crate::repository::MemoryStore;
    use crate::scrapers::{FetchError, ProductFetcher, RenderedPage};

    struct NeverFetcher;

    #[async_trait::async_trait]
    impl ProductFetcher for NeverFetcher {
        async fn fetch(&self, _barcode: &str) -> Result<RenderedPage, FetchError> {
            Err(FetchError::navigation("https://example.org", "test fetcher"))
        }
    }

    fn test_state() -> AppState {
        let repo = CatalogRepository::new(Arc::new(MemoryStore::new()));
        let processor = Arc::new(Processor::new(
            repo.clone(),
            Arc::new(NeverFetcher),
            ProcessorConfig::default(),
        ));
        AppState { repo, processor }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_endpoint_reports_stopped_worker() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/processor/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["running"], false);
    }

    #[tokio::test]
    async fn enqueue_then_list_round_trips() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/unfound-barcodes")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"barcode": "8901234567890", "source": "device_report", "deviceId": "pos-3"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::get("/api/unfound-barcodes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["barcode"], "8901234567890");
        assert_eq!(json["data"][0]["deviceId"], "pos-3");
    }

    #[tokio::test]
    async fn enqueue_requires_a_barcode() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/unfound-barcodes")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"barcode": ""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn run_now_without_worker_is_an_error_envelope() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/processor/run-now")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn start_stop_cycle_over_the_api() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/processor/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");

        // Second start is rejected while the loop is alive.
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/processor/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");

        let response = app
            .oneshot(
                Request::post("/api/processor/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");

        state.processor.shutdown().await;
        assert!(!state.processor.is_running().await);
    }

    #[tokio::test]
    async fn verify_endpoint_promotes_unverified_products() {
        let state = test_state();

        // Seed an unverified catalog record the way the worker would.
        let record = crate::models::CatalogRecord {
            barcode: "8901234567890".into(),
            name: "Seeded".into(),
            price: "₹9".into(),
            mrp: "₹9".into(),
            image: crate::models::PLACEHOLDER_IMAGE_URL.into(),
            brand: String::new(),
            category: String::new(),
            description: String::new(),
            verified: false,
            source: crate::models::CatalogSource::BackgroundProcessor,
            created_at: chrono::Utc::now(),
            scraped_at: None,
            verified_at: None,
            original_unfound_id: None,
            recently_added_id: None,
        };
        state.repo.catalog_put(&record).await.unwrap();

        let app = create_router(state.clone());
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/products/unverified")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 1);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/products/verify")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"barcodes": ["8901234567890"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["verifiedCount"], 1);

        let response = app
            .oneshot(
                Request::get("/api/products/unverified")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn history_clear_empties_history() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/processor/history/clear")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/processor/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unfound_sources_counts_per_origin() {
        let state = test_state();
        state
            .repo
            .enqueue("1", BarcodeSource::Manual, None, None)
            .await
            .unwrap();
        state
            .repo
            .enqueue("2", BarcodeSource::BulkImport, None, None)
            .await
            .unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(
                Request::get("/api/unfound-barcodes/sources")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["manual"], 1);
        assert_eq!(json["data"]["bulk_import"], 1);
    }
}
