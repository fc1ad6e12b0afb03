//! gtinfill - barcode catalog acquisition system.
//!
//! Fills gaps in a barcode-keyed product catalog by scraping a consumer
//! lookup site with a headless browser, reconciling results into a
//! verification-gated catalog cache.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod server;
pub mod services;
