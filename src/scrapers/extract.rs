//! Product field extraction heuristics.
//!
//! Pure functions over a fetched page: an ordered cascade of selectors
//! and acceptance predicates per field, tried strictly in order with the
//! first match winning. The cascades are tuned against the lookup site's
//! rendered markup but degrade to generic patterns so layout drift loses
//! fields gradually instead of all at once.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{RenderedPage, DEFAULT_LOOKUP_BASE_URL};
use crate::models::PLACEHOLDER_IMAGE_URL;

/// Phrases that mark a page as an error/not-found response. Matched
/// against the lowercased page source.
const ERROR_PHRASES: &[&str] = &[
    "string indices must be integers, not 'str'",
    "404 error",
    "page not found",
    "invalid barcode",
    "barcode not found",
    "no product data available",
    "error: product not found",
];

/// The bare phrase "product not found" only rejects the page when it
/// appears in one of these explicit error contexts. Legitimate product
/// pages can echo the phrase non-erroneously, and a false negative
/// (dropping a findable product) costs more than an extraction attempt
/// against a true error page.
const NOT_FOUND_CONTEXTS: &[&str] = &[
    "error: product not found",
    "alert: product not found",
    "message: product not found",
    "status: product not found",
];

/// The site's own brand string, filtered out of title-based names.
const SITE_BRAND: &str = "Smart Consumer";

const CURRENCY_TOKENS: &[&str] = &["₹", "Rs", "$", "€", "£"];

/// Name cascade, most specific product containers first, generic
/// headings as backstop.
const NAME_SELECTORS: &[&str] = &[
    "h1",
    "[data-testid*='product-name']",
    ".product-name",
    ".product-title",
    ".product-info h1",
    ".product-info h2",
    ".product-details h1",
    ".product-details h2",
];

/// MRP-specific selectors, tried before the generic price cascade.
const MRP_SELECTORS: &[&str] = &[
    "[data-testid*='mrp']",
    ".mrp",
    ".product-mrp",
    ".max-retail-price",
    ".retail-price",
    "[class*='mrp']",
    "[class*='retail']",
];

const PRICE_SELECTORS: &[&str] = &[
    "[data-testid*='price']",
    ".price",
    ".product-price",
    ".cost",
    ".amount",
    ".selling-price",
];

/// Image cascade. The bare `img` selector leads deliberately: the site
/// renders the product shot as the first real image, and the rejection
/// predicates below weed out logos and placeholders.
const IMG_SELECTORS: &[&str] = &[
    "img",
    "[data-testid*='product-image']",
    "[data-testid*='image']",
    ".product-image img",
    ".product-photo img",
    ".product-img img",
    ".product-picture img",
    ".main-image img",
    ".hero-image img",
    ".featured-image img",
    "img[alt*='product']",
    "img[alt*='Product']",
    "img[src*='product']",
    "img[src*='Product']",
    "img[src*='gs1datakart']",
    "img[src*='api.gs1datakart.org']",
    "img[class*='product']",
    "img[class*='main']",
    "img[class*='hero']",
    "img[class*='featured']",
    ".image-container img",
    ".photo-container img",
    ".img-container img",
    "picture img",
    "figure img",
];

/// Structured fields pulled out of a product page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedProduct {
    pub barcode: String,
    pub name: Option<String>,
    pub price: Option<String>,
    /// Always populated: a real extracted URL, a synthesized one, or the
    /// fixed placeholder. Never part of the acceptance decision.
    pub image: String,
}

/// Outcome of an extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Found(ExtractedProduct),
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Extract product fields from a rendered page.
///
/// Succeeds iff at least one of name/price was found; the image field
/// never gates the outcome.
pub fn extract(page: &RenderedPage, barcode: &str) -> Extraction {
    if is_error_page(page) {
        return Extraction::NotFound;
    }

    let doc = Html::parse_document(&page.html);
    let origin = site_origin(page);

    let name = extract_name(&doc, &page.title);
    let price = extract_price(&doc, &page.html);
    let image = extract_image(&doc, &origin, barcode);

    if name.is_some() || price.is_some() {
        Extraction::Found(ExtractedProduct {
            barcode: barcode.to_string(),
            name,
            price,
            image,
        })
    } else {
        debug!("No name or price found for {}", barcode);
        Extraction::NotFound
    }
}

/// Error-page rejection: URL and title indicators, then known error
/// phrases in the page source.
fn is_error_page(page: &RenderedPage) -> bool {
    let url = page.final_url.to_lowercase();
    if url.contains("404") || url.contains("error") || url.contains("not-found") {
        debug!("Error page detected from URL: {}", page.final_url);
        return true;
    }
    if page.title.to_lowercase().contains("error") {
        return true;
    }

    let text = page.html.to_lowercase();
    for phrase in ERROR_PHRASES {
        if text.contains(phrase) {
            debug!("Error phrase detected in page: '{}'", phrase);
            return true;
        }
    }

    // The bare phrase is tolerated outside an explicit error context.
    if text.contains("product not found")
        && NOT_FOUND_CONTEXTS.iter().any(|ctx| text.contains(ctx))
    {
        return true;
    }

    false
}

fn extract_name(doc: &Html, title: &str) -> Option<String> {
    for selector in NAME_SELECTORS {
        let Some(text) = select_first_text(doc, selector) else {
            continue;
        };
        if contains_error_phrase(&text) {
            debug!("Skipping error message as product name: '{}'", text);
            continue;
        }
        return Some(text);
    }

    // Fall back to the page title, filtered to exclude the site's own
    // branding and junk-short strings.
    let title = title.trim();
    if !title.is_empty() && !title.contains(SITE_BRAND) && title.chars().count() > 5 {
        return Some(title.to_string());
    }

    None
}

fn extract_price(doc: &Html, html: &str) -> Option<String> {
    // Tier 1: MRP-specific selectors.
    for selector in MRP_SELECTORS {
        if let Some(text) = select_first_text(doc, selector) {
            if contains_currency(&text) {
                return Some(text);
            }
        }
    }

    // Tier 2: generic price selectors.
    for selector in PRICE_SELECTORS {
        if let Some(text) = select_first_text(doc, selector) {
            if contains_currency(&text) {
                return Some(text);
            }
        }
    }

    // Tier 3: currency-prefixed numeric patterns in the raw markup.
    for pattern in [
        r"₹\s*[\d,]+\.?\d*",
        r"Rs\s*[\d,]+\.?\d*",
        r"\$\s*[\d,]+\.?\d*",
        r"€\s*[\d,]+\.?\d*",
        r"£\s*[\d,]+\.?\d*",
    ] {
        if let Ok(re) = regex::Regex::new(pattern) {
            if let Some(m) = re.find(html) {
                return Some(m.as_str().to_string());
            }
        }
    }

    // Tier 4: any element whose own text bears a currency token and is
    // short enough to plausibly be a price.
    if let Ok(selector) = Selector::parse("*") {
        for el in doc.select(&selector) {
            let text = own_text(&el);
            let text = text.trim();
            if !text.is_empty() && contains_currency(text) && text.chars().count() < 20 {
                return Some(text.to_string());
            }
        }
    }

    None
}

fn extract_image(doc: &Html, origin: &str, barcode: &str) -> String {
    for selector_str in IMG_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for el in doc.select(&selector) {
            if let Some(url) = qualify_image(&el, origin) {
                return url;
            }
        }
    }

    // Fallback: any img with plausible product dimensions or a telling
    // source path.
    if let Ok(selector) = Selector::parse("img") {
        for el in doc.select(&selector) {
            let Some(src) = el.value().attr("src") else {
                continue;
            };
            let src = src.trim();
            let lower = src.to_lowercase();
            let large = dimension(&el, "width").is_some_and(|px| px > 100)
                || dimension(&el, "height").is_some_and(|px| px > 100);
            if !src.is_empty()
                && (large || lower.contains("product") || lower.contains("item"))
            {
                if let Some(url) = normalize_image_url(src, origin) {
                    return url;
                }
            }
        }
    }

    synthesize_image_url(barcode)
}

/// Apply the rejection predicates to an image candidate and normalize
/// its URL on acceptance.
fn qualify_image(el: &ElementRef, origin: &str) -> Option<String> {
    let src = el.value().attr("src")?.trim();
    if src.is_empty() {
        return None;
    }

    let lower = src.to_lowercase();
    if src.starts_with("data:")
        || lower.contains("placeholder")
        || lower.contains("logo")
        || lower.contains("icon")
    {
        return None;
    }

    // Zero or undeclared dimensions are tolerated: the element may be
    // CSS-sized.
    for attr in ["width", "height"] {
        if let Some(px) = dimension(el, attr) {
            if px != 0 && px < 50 {
                return None;
            }
        }
    }

    normalize_image_url(src, origin)
}

fn normalize_image_url(src: &str, origin: &str) -> Option<String> {
    if src.starts_with("http") {
        Some(src.to_string())
    } else if src.starts_with("//") {
        Some(format!("https:{}", src))
    } else if src.starts_with('/') {
        Some(format!("{}{}", origin, src))
    } else {
        None
    }
}

/// Best-effort image URL for barcodes the page yielded nothing for:
/// the GS1 DataKart upload convention keys renders by the barcode's
/// 9-digit prefix. Too-short barcodes get the fixed placeholder.
fn synthesize_image_url(barcode: &str) -> String {
    match barcode.get(..9) {
        Some(prefix) if barcode.len() >= 13 => format!(
            "https://api.gs1datakart.org/files/render?file_key=product_upload/{}/{}/{}_f.png",
            prefix, barcode, barcode
        ),
        _ => PLACEHOLDER_IMAGE_URL.to_string(),
    }
}

fn site_origin(page: &RenderedPage) -> String {
    Url::parse(&page.requested_url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|| DEFAULT_LOOKUP_BASE_URL.to_string())
}

/// First match's text for a selector, or None if the selector misses or
/// its first match is empty.
fn select_first_text(doc: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    let el = doc.select(&selector).next()?;
    let text = el.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text directly inside an element, excluding descendants.
fn own_text(el: &ElementRef) -> String {
    el.children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect()
}

fn contains_currency(text: &str) -> bool {
    CURRENCY_TOKENS.iter().any(|token| text.contains(token))
}

fn contains_error_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn dimension(el: &ElementRef, attr: &str) -> Option<u32> {
    el.value().attr(attr)?.trim().parse().ok()
}
