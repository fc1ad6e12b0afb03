//! Plain-HTTP fetch path for when the browser engine is unavailable.
//!
//! Issues a GET with a full browser-like header set through a retrying
//! session. Cannot see JavaScript-rendered content, so extraction over
//! these pages under-performs; it exists to keep the worker limping
//! along on hosts without Chrome.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{mimicry, FetchEngine, FetchError, RenderedPage, USER_AGENT};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ATTEMPTS: u32 = 3;

/// Retrying reqwest client with browser-like headers.
pub struct FallbackHttpClient {
    client: reqwest::Client,
}

impl FallbackHttpClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(browser_headers())
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::EngineUnavailable(format!("http client: {}", e)))?;
        Ok(Self { client })
    }

    /// Fetch a URL, retrying with exponential backoff on transport errors.
    pub async fn fetch(&self, url: &str) -> Result<RenderedPage, FetchError> {
        // Jitter before the first request so fallback traffic does not
        // arrive in lockstep either.
        mimicry::pause(1.0, 3.0).await;

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << attempt);
                debug!("Fallback retry {} for {} after {:?}", attempt, url, backoff);
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() {
                        // Transient upstream failure; burn a retry.
                        last_error = Some(format!("HTTP {}", status));
                        continue;
                    }
                    let final_url = response.url().to_string();
                    match response.text().await {
                        Ok(html) => {
                            if !status.is_success() {
                                // A 4xx still carries a page; the extractor's
                                // error-page checks judge it.
                                warn!("Fallback fetch of {} returned HTTP {}", url, status);
                            }
                            let title = extract_title(&html);
                            return Ok(RenderedPage {
                                requested_url: url.to_string(),
                                final_url,
                                title,
                                html,
                                engine: FetchEngine::HttpFallback,
                            });
                        }
                        Err(e) => last_error = Some(e.to_string()),
                    }
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        Err(FetchError::navigation(
            url,
            last_error.unwrap_or_else(|| "request failed".to_string()),
        ))
    }
}

/// Header set mimicking an interactive desktop Chrome navigation.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers
}

/// Pull the `<title>` text out of raw markup.
pub(crate) fn extract_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
