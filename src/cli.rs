//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::BarcodeSource;
use crate::repository::CatalogRepository;
use crate::scrapers::PageFetcher;
use crate::server;
use crate::services::{Processor, ProcessorConfig};

#[derive(Parser)]
#[command(name = "gtinfill")]
#[command(about = "Barcode catalog acquisition system")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true, env = "GTINFILL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run the control server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Start the background worker immediately
        #[arg(long)]
        autostart: bool,
    },

    /// Run one synchronous pass over the unfound queue
    Process,

    /// Queue a barcode for acquisition
    Enqueue {
        /// Barcode value
        barcode: String,
        /// Submission source: manual, bulk_import, or device_report
        #[arg(short, long, default_value = "manual")]
        source: String,
        /// Reporting device id
        #[arg(long)]
        device_id: Option<String>,
        /// Reporting location
        #[arg(long)]
        location: Option<String>,
    },

    /// Show queue and catalog status
    Status,
}

/// Parse CLI arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => init(&settings),
        Commands::Serve {
            host,
            port,
            autostart,
        } => {
            let mut settings = settings;
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            server::serve(&settings, autostart).await
        }
        Commands::Process => process_once(&settings).await,
        Commands::Enqueue {
            barcode,
            source,
            device_id,
            location,
        } => enqueue(&settings, &barcode, &source, device_id, location).await,
        Commands::Status => status(&settings).await,
    }
}

fn init(settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    let _ = settings.open_store()?;
    let config_path = settings.write_default_config(&settings.data_dir)?;

    println!(
        "{} Initialized data directory at {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  config: {}", config_path.display());
    println!("  database: {}", settings.database_path().display());
    Ok(())
}

async fn process_once(settings: &Settings) -> anyhow::Result<()> {
    let repo = CatalogRepository::new(settings.open_store()?);
    let queued = repo.queue_size().await?;
    if queued == 0 {
        println!("{} No unfound barcodes queued", style("·").dim());
        return Ok(());
    }

    let fetcher =
        PageFetcher::new(settings.fetcher.clone()).map_err(|e| anyhow::anyhow!("{}", e))?;
    let processor = Arc::new(Processor::new(
        repo.clone(),
        Arc::new(fetcher),
        ProcessorConfig::default(),
    ));

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(format!("Processing {} unfound barcodes...", queued));
    bar.enable_steady_tick(Duration::from_millis(120));

    let result = processor.drain_once().await;
    bar.finish_and_clear();

    let summary = result.map_err(|e| anyhow::anyhow!("{}", e))?;
    println!(
        "{} Processed {} barcodes: {} resolved, {} failed",
        style("✓").green(),
        summary.processed_count,
        style(summary.success_count).green(),
        style(summary.error_count).red(),
    );

    for entry in processor.history().await {
        let marker = if entry.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {}  {}", marker, entry.barcode, entry.result);
    }
    Ok(())
}

async fn enqueue(
    settings: &Settings,
    barcode: &str,
    source: &str,
    device_id: Option<String>,
    location: Option<String>,
) -> anyhow::Result<()> {
    let barcode = barcode.trim();
    if barcode.is_empty() {
        anyhow::bail!("barcode must not be empty");
    }
    let source = BarcodeSource::from_str(source).ok_or_else(|| {
        anyhow::anyhow!("invalid source '{}'; expected manual, bulk_import, or device_report", source)
    })?;

    let repo = CatalogRepository::new(settings.open_store()?);
    if repo.catalog_exists(barcode).await? {
        println!(
            "{} Barcode {} is already in the catalog; not queued",
            style("·").dim(),
            barcode
        );
        return Ok(());
    }

    repo.enqueue(barcode, source, device_id, location).await?;
    println!("{} Queued barcode {}", style("✓").green(), barcode);
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let repo = CatalogRepository::new(settings.open_store()?);

    let queued = repo.queue_size().await?;
    let sources = repo.queue_sources().await?;
    let unverified = repo.unverified_products().await?.len();
    let staged = repo.staging_list().await?.len();

    println!("{}", style("gtinfill status").bold());
    println!("  unfound queue:    {}", queued);
    for (source, count) in &sources {
        println!("    {:16} {}", source, count);
    }
    println!("  unverified:       {}", unverified);
    println!("  recently added:   {}", staged);
    Ok(())
}
