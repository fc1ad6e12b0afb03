//! Document store capability.
//!
//! The dashboard treats its database as a plain document store: named
//! collections of JSON documents addressed by key, with a whole-collection
//! scan and a single-field equality filter. Everything the worker and the
//! control surface persist goes through this trait, which keeps the
//! backends swappable (in-memory for tests and ephemeral runs, SQLite for
//! real deployments).

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Collection names used by the acquisition subsystem.
pub mod collections {
    /// Barcodes awaiting a scraping attempt.
    pub const UNFOUND_BARCODES: &str = "unfound_barcodes";
    /// Resolved products, keyed by barcode.
    pub const BARCODE_CACHE: &str = "barcode_cache";
    /// Staging entries for the recently-added review tab.
    pub const RECENTLY_ADDED: &str = "recently_added_products";
}

/// Errors surfaced by document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{key} not found")]
    NotFound { collection: String, key: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key/value document store with collection scan and equality filter.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document, `None` if absent.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Upsert a document under the given key.
    async fn set(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError>;

    /// Merge fields into an existing document. Fails with [`StoreError::NotFound`]
    /// if the key is absent.
    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Delete a document; returns whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError>;

    /// All documents in a collection, in unspecified order.
    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Documents whose top-level `field` equals `value`.
    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError>;
}

/// Merge `fields` into a JSON object document in place.
pub(crate) fn merge_fields(doc: &mut Value, fields: Map<String, Value>) {
    if let Value::Object(obj) = doc {
        for (k, v) in fields {
            obj.insert(k, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_and_adds_fields() {
        let mut doc = json!({"a": 1, "b": 2});
        let mut fields = Map::new();
        fields.insert("b".to_string(), json!(3));
        fields.insert("c".to_string(), json!("x"));
        merge_fields(&mut doc, fields);
        assert_eq!(doc, json!({"a": 1, "b": 3, "c": "x"}));
    }

    #[test]
    fn merge_ignores_non_objects() {
        let mut doc = json!([1, 2]);
        let mut fields = Map::new();
        fields.insert("a".to_string(), json!(1));
        merge_fields(&mut doc, fields);
        assert_eq!(doc, json!([1, 2]));
    }
}
