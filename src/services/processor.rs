//! The background acquisition worker.
//!
//! A single task drains the unfound queue continuously: fetch, extract,
//! reconcile, record, pace, repeat. Items are processed strictly one at
//! a time; concurrent browser sessions would amplify exactly the
//! automation footprint the pacing is meant to hide.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::history::ProcessingHistory;
use super::reconcile::{Outcome, Reconciler};
use crate::models::{BarcodeRecord, HistoryEntry, ProcessingStatus};
use crate::repository::{CatalogRepository, StoreError};
use crate::scrapers::{extract, mimicry, FetchError, ProductFetcher};

/// Worker pacing and polling configuration.
///
/// The delay ranges are a hard requirement of the scraping contract, not
/// tuning knobs; tests inject short values through this struct.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Sleep between queue polls when the queue is empty.
    pub idle_poll_interval: Duration,
    /// Inter-item human-mimicry delay after a successful item (seconds).
    pub item_delay_range: (f64, f64),
    /// Longer inter-item delay after a failed item (seconds).
    pub failure_delay_range: (f64, f64),
    /// Cooldown after a batch-level error before retrying the loop.
    pub error_cooldown: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval: Duration::from_secs(30),
            item_delay_range: (2.0, 6.0),
            failure_delay_range: (8.0, 15.0),
            error_cooldown: Duration::from_secs(60),
        }
    }
}

/// Control-level errors returned to API callers.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("background processor is already running")]
    AlreadyRunning,

    #[error("background processor is not running; start it first")]
    NotRunning,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle to the background worker: owns its status, history, and task.
pub struct Processor {
    repo: CatalogRepository,
    fetcher: Arc<dyn ProductFetcher>,
    reconciler: Reconciler,
    config: ProcessorConfig,
    status: RwLock<ProcessingStatus>,
    history: ProcessingHistory,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    pub fn new(
        repo: CatalogRepository,
        fetcher: Arc<dyn ProductFetcher>,
        config: ProcessorConfig,
    ) -> Self {
        let reconciler = Reconciler::new(repo.clone());
        Self {
            repo,
            fetcher,
            reconciler,
            config,
            status: RwLock::new(ProcessingStatus::default()),
            history: ProcessingHistory::new(),
            cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
        }
    }

    /// Whether the worker task is currently alive.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the continuous loop. Returns `false` if it is already
    /// running (liveness judged by the task handle, not the status flag).
    pub async fn start(self: Arc<Self>) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Background processor already running");
            return false;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();
        self.status.write().await.reset_for_run();

        let processor = Arc::clone(&self);
        *task = Some(tokio::spawn(async move {
            processor.run_loop(token).await;
        }));
        info!("Background processor started in continuous mode");
        true
    }

    /// Request a graceful stop. The loop observes the token between
    /// items, so stop latency is bounded by one item's processing time.
    pub async fn stop(&self) {
        self.cancel.lock().await.cancel();
        let mut status = self.status.write().await;
        status.running = false;
        status.current_barcode = None;
        info!("Background processor stop requested");
    }

    /// Stop and wait for the worker task to finish.
    pub async fn shutdown(&self) {
        self.stop().await;
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Immediate-drain trigger. The loop already polls continuously, so
    /// this only reports the current queue size; a second concurrent
    /// pass would break the single-worker invariant and is rejected.
    pub async fn run_now(&self) -> Result<usize, ProcessorError> {
        if !self.is_running().await {
            return Err(ProcessorError::NotRunning);
        }
        Ok(self.repo.queue_size().await.map_err(ProcessorError::Store)?)
    }

    /// Synchronous one-shot pass over the current queue contents, for
    /// the CLI. Refused while the continuous loop is active.
    pub async fn drain_once(&self) -> Result<ProcessingStatus, ProcessorError> {
        if self.is_running().await {
            return Err(ProcessorError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();
        self.status.write().await.reset_for_run();

        let result = self.run_batch(&token).await;

        {
            let mut status = self.status.write().await;
            status.running = false;
            status.current_barcode = None;
        }
        result?;
        Ok(self.status().await)
    }

    /// Current status snapshot.
    pub async fn status(&self) -> ProcessingStatus {
        self.status.read().await.clone()
    }

    /// Recent processing outcomes, oldest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.snapshot().await
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
    }

    /// The continuous loop body. Designed to be un-killable by transient
    /// errors: batch-level failures cool down and retry, and only
    /// cancellation exits.
    async fn run_loop(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            match self.run_batch(&cancel).await {
                Ok(0) => {
                    debug!("No unfound barcodes to process; idling");
                    self.cancellable_sleep(&cancel, self.config.idle_poll_interval)
                        .await;
                }
                Ok(count) => {
                    debug!("Completed batch of {} barcodes", count);
                }
                Err(e) => {
                    error!("Processor batch error: {}; cooling down", e);
                    self.cancellable_sleep(&cancel, self.config.error_cooldown)
                        .await;
                }
            }
        }

        let mut status = self.status.write().await;
        status.running = false;
        status.current_barcode = None;
        info!("Background processor stopped");
    }

    /// Process everything currently queued. Returns the batch size.
    async fn run_batch(&self, cancel: &CancellationToken) -> Result<usize, StoreError> {
        let batch = self.repo.pending_barcodes().await?;
        if batch.is_empty() {
            return Ok(0);
        }

        info!("Processing batch of {} unfound barcodes", batch.len());
        for (index, record) in batch.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Stop requested mid-batch; {} items remaining", batch.len() - index);
                break;
            }

            let success = self.process_item(record).await;

            // Pacing between items regardless of outcome: this bounds the
            // whole system's request rate against the lookup site.
            let (min_secs, max_secs) = if success {
                self.config.item_delay_range
            } else {
                self.config.failure_delay_range
            };
            let pause = mimicry::pause_duration(min_secs, max_secs);
            debug!("Waiting {:.1?} before next barcode", pause);
            self.cancellable_sleep(cancel, pause).await;
        }

        self.status.write().await.current_barcode = None;
        Ok(batch.len())
    }

    /// Process one queue entry. Never propagates: every failure is
    /// counted, recorded, and swallowed so one bad barcode cannot halt
    /// the batch.
    async fn process_item(&self, record: &BarcodeRecord) -> bool {
        {
            let mut status = self.status.write().await;
            status.current_barcode = Some(record.barcode.clone());
            status.processed_count += 1;
        }
        debug!("Processing barcode {}", record.barcode);

        let (entry, success) = match self.attempt(record).await {
            Ok(Outcome::Resolved { name }) => {
                info!("Resolved {} as '{}'", record.barcode, name);
                (HistoryEntry::resolved(&record.barcode, &name), true)
            }
            Ok(Outcome::AlreadyCached) => {
                debug!("Barcode {} already cached; dropped stale queue entry", record.barcode);
                (HistoryEntry::already_cached(&record.barcode), true)
            }
            Ok(Outcome::Abandoned) => {
                // The expected outcome for genuinely absent products; not
                // an application error, but it counts against the run.
                info!("Barcode {} not found; removed from queue", record.barcode);
                (HistoryEntry::abandoned(&record.barcode), false)
            }
            Err(message) => {
                warn!("Error processing barcode {}: {}", record.barcode, message);
                (HistoryEntry::failed(&record.barcode, &message), false)
            }
        };

        {
            let mut status = self.status.write().await;
            if entry.success {
                status.success_count += 1;
            } else {
                status.error_count += 1;
            }
        }
        self.history.push(entry).await;
        success
    }

    /// One full acquisition attempt: fetch, extract, reconcile.
    async fn attempt(&self, record: &BarcodeRecord) -> Result<Outcome, String> {
        // Existence pre-check: a crash after a catalog write but before
        // the queue delete must not reprocess the barcode.
        match self.repo.catalog_exists(&record.barcode).await {
            Ok(true) => {
                self.repo
                    .remove_queued(&record.barcode)
                    .await
                    .map_err(|e| e.to_string())?;
                return Ok(Outcome::AlreadyCached);
            }
            Ok(false) => {}
            Err(e) => return Err(e.to_string()),
        }

        match self.fetcher.fetch(&record.barcode).await {
            Ok(page) => {
                let extraction = extract(&page, &record.barcode);
                self.reconciler
                    .reconcile(record, &extraction)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e @ FetchError::Navigation { .. }) => {
                // Navigation failures follow the same delete-on-failure
                // policy as a definitive not-found.
                if let Err(store_err) = self.repo.remove_queued(&record.barcode).await {
                    return Err(format!("{}; queue cleanup failed: {}", e, store_err));
                }
                Err(e.to_string())
            }
            Err(e @ FetchError::EngineUnavailable(_)) => {
                // The fetcher recovers engine loss internally; seeing it
                // here means the fallback path could not run either.
                // Leave the entry queued for the next pass.
                Err(e.to_string())
            }
        }
    }

    async fn cancellable_sleep(&self, cancel: &CancellationToken, duration: Duration) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}
