//! Browser-based product page fetcher.
//!
//! Uses chromiumoxide (CDP) in headless mode with automation-detection
//! suppression: spoofed navigator properties, a realistic desktop user
//! agent, randomized post-load pauses and scrolling. Falls back to the
//! plain-HTTP client when no usable browser engine is present.

use serde::{Deserialize, Serialize};

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::debug;
use tracing::warn;

use super::http_fallback::FallbackHttpClient;
#[cfg(feature = "browser")]
use super::mimicry;
use super::{lookup_url, FetchError, ProductFetcher, RenderedPage, DEFAULT_LOOKUP_BASE_URL};
#[cfg(feature = "browser")]
use super::{http_fallback::extract_title, FetchEngine, USER_AGENT};

/// Readiness signals: product content, a heading, or an explicit error
/// marker. Whichever appears first ends the wait.
#[cfg(feature = "browser")]
const READY_SELECTORS: &[&str] = &[
    "h1",
    "[data-testid*='product']",
    ".product-info",
    ".product-details",
    ".error",
    ".not-found",
];

/// Scripts injected to defeat automation detection. Subset of the
/// puppeteer-extra stealth techniques that matter for this target.
#[cfg(feature = "browser")]
const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix plugins (make it look like regular Chrome)
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
];

/// Fetcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Lookup site base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Run the browser headless (default: true). Set to false for
    /// debugging sessions.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Bounded wait for a readiness signal, in seconds. Timing out is
    /// non-fatal; extraction proceeds against whatever rendered.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_base_url() -> String {
    DEFAULT_LOOKUP_BASE_URL.to_string()
}

fn default_headless() -> bool {
    true
}

fn default_ready_timeout() -> u64 {
    10
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            headless: default_headless(),
            ready_timeout_secs: default_ready_timeout(),
            chrome_args: Vec::new(),
        }
    }
}

/// Production fetcher: browser engine first, HTTP fallback second.
pub struct PageFetcher {
    config: FetcherConfig,
    fallback: FallbackHttpClient,
}

impl PageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        Ok(Self {
            config,
            fallback: FallbackHttpClient::new()?,
        })
    }
}

#[async_trait::async_trait]
impl ProductFetcher for PageFetcher {
    async fn fetch(&self, barcode: &str) -> Result<RenderedPage, FetchError> {
        let url = lookup_url(&self.config.base_url, barcode);

        match self.fetch_with_browser(&url).await {
            Ok(page) => Ok(page),
            Err(FetchError::EngineUnavailable(reason)) => {
                // Degraded capability, not an item failure: retry the
                // lookup over plain HTTP.
                warn!(
                    "Browser engine unavailable ({}); falling back to HTTP fetch for {}",
                    reason, url
                );
                self.fallback.fetch(&url).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(feature = "browser")]
impl PageFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Find a Chrome executable on this host.
    fn find_chrome() -> Result<std::path::PathBuf, FetchError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(FetchError::EngineUnavailable(
            "Chrome/Chromium not found on this host".to_string(),
        ))
    }

    /// Launch a browser, drive the page, and tear the session down on
    /// every exit path.
    async fn fetch_with_browser(&self, url: &str) -> Result<RenderedPage, FetchError> {
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.config.headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--window-size=1920,1080")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| FetchError::EngineUnavailable(format!("browser config: {}", e)))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::EngineUnavailable(format!("launch failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let result = self.drive_page(&browser, url).await;

        // Teardown regardless of how the drive ended.
        let _ = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        result
    }

    async fn drive_page(&self, browser: &Browser, url: &str) -> Result<RenderedPage, FetchError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::navigation(url, e))?;

        let result = self.drive(&page, url).await;
        let _ = page.close().await;
        result
    }

    async fn drive(&self, page: &Page, url: &str) -> Result<RenderedPage, FetchError> {
        page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await
            .map_err(|e| FetchError::navigation(url, e))?;

        let nav = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| FetchError::navigation(url, e))?;
        page.execute(nav)
            .await
            .map_err(|e| FetchError::navigation(url, e))?;

        // Defeat the navigator automation flag before the page's own
        // scripts get a chance to look at it.
        self.apply_stealth(page).await;

        // Human-mimicry pause after load, then a small reading scroll.
        mimicry::pause(1.5, 3.0).await;
        let px = mimicry::scroll_amount(50, 200);
        let _ = page
            .evaluate(format!("window.scrollBy(0, {});", px))
            .await;
        mimicry::pause(0.3, 0.8).await;

        self.wait_for_ready(page).await;

        // Provoke lazy-loaded images: scroll mid-page, then back to top.
        let _ = page
            .evaluate("window.scrollTo(0, document.body.scrollHeight/2);".to_string())
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = page.evaluate("window.scrollTo(0, 0);".to_string()).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let final_url = page
            .url()
            .await
            .map_err(|e| FetchError::navigation(url, e))?
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::navigation(url, e))?;

        let title = match page.evaluate("document.title".to_string()).await {
            Ok(result) => result.into_value().unwrap_or_default(),
            Err(_) => extract_title(&html),
        };

        Ok(RenderedPage {
            requested_url: url.to_string(),
            final_url,
            title,
            html,
            engine: FetchEngine::Browser,
        })
    }

    /// Apply stealth evasion scripts; failures are best-effort only.
    async fn apply_stealth(&self, page: &Page) {
        for script in STEALTH_SCRIPTS {
            if let Err(e) = page.evaluate(script.to_string()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }

    /// Wait, bounded, for any readiness signal to appear. A timeout is
    /// non-fatal; extraction proceeds against whatever rendered.
    async fn wait_for_ready(&self, page: &Page) {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.ready_timeout_secs);
        loop {
            for selector in READY_SELECTORS {
                if page.find_element(*selector).await.is_ok() {
                    return;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("Timeout waiting for page readiness signals");
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[cfg(not(feature = "browser"))]
impl PageFetcher {
    async fn fetch_with_browser(&self, _url: &str) -> Result<RenderedPage, FetchError> {
        Err(FetchError::EngineUnavailable(
            "browser support not compiled; rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
