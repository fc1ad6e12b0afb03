//! Data models for gtinfill.

mod product;
mod status;

pub use product::{
    BarcodeRecord, BarcodeSource, CatalogRecord, CatalogSource, QueueStatus, StagingRecord,
    PLACEHOLDER_IMAGE_URL,
};
pub use status::{HistoryEntry, ProcessingStatus};
