//! gtinfill - barcode catalog acquisition system.
//!
//! Admin dashboard backend: an unfound-barcode queue drained by a
//! background scraping worker, with a catalog cache and verification
//! workflow on top.

use gtinfill::cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "gtinfill=info"
    } else {
        "gtinfill=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
