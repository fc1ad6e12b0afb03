//! In-memory document store backend.
//!
//! Used by tests and by `serve --ephemeral` runs where nothing should
//! touch disk. Single-process only.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::store::{merge_fields, DocumentStore, StoreError};

/// Process-local document store backed by nested maps.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn set(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        merge_fields(doc, fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let all = self.scan(collection).await?;
        Ok(all
            .into_iter()
            .filter(|(_, doc)| doc.get(field) == Some(value))
            .collect())
    }
}
