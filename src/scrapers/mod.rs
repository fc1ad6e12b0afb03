//! Product page fetching and extraction.
//!
//! The fetcher drives a headless browser (with a plain-HTTP fallback)
//! against the GS1 Smart Consumer lookup site; the extractor pulls
//! structured product fields out of whatever rendered.

mod browser;
mod extract;
mod http_fallback;
pub mod mimicry;

pub use browser::{FetcherConfig, PageFetcher};
pub use extract::{extract, ExtractedProduct, Extraction};
pub use http_fallback::FallbackHttpClient;

use async_trait::async_trait;
use thiserror::Error;

/// Desktop user agent presented by both fetch paths.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default lookup host. Product pages live under the GS1 Digital Link
/// path `/01/{gtin}`.
pub const DEFAULT_LOOKUP_BASE_URL: &str = "https://smartconsumer-beta.org";

/// Build the canonical product lookup URL for a barcode.
pub fn lookup_url(base_url: &str, barcode: &str) -> String {
    format!("{}/01/{}", base_url.trim_end_matches('/'), barcode)
}

/// Which engine produced a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEngine {
    /// Full browser render, JavaScript executed.
    Browser,
    /// Plain HTTP GET; JavaScript-rendered content is invisible.
    HttpFallback,
}

/// A fetched product page, ready for extraction.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL we asked for.
    pub requested_url: String,
    /// URL the session ended up at (redirects, error pages).
    pub final_url: String,
    /// Document title as rendered.
    pub title: String,
    /// Serialized markup of the rendered document.
    pub html: String,
    pub engine: FetchEngine,
}

/// Fetch failures. `EngineUnavailable` is recovered internally by the
/// fallback path and only escapes when the fallback itself cannot run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },
}

impl FetchError {
    pub(crate) fn navigation(url: &str, message: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// Capability to turn a barcode into a rendered product page.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    async fn fetch(&self, barcode: &str) -> Result<RenderedPage, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_url_uses_digital_link_path() {
        assert_eq!(
            lookup_url(DEFAULT_LOOKUP_BASE_URL, "8901234567890"),
            "https://smartconsumer-beta.org/01/8901234567890"
        );
    }

    #[test]
    fn lookup_url_tolerates_trailing_slash() {
        assert_eq!(
            lookup_url("https://example.org/", "123"),
            "https://example.org/01/123"
        );
    }
}
