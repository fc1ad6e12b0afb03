//! Persistence layer: document store capability and typed repositories.

mod catalog;
mod memory;
mod sqlite;
mod store;

pub use catalog::CatalogRepository;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{collections, DocumentStore, StoreError};
