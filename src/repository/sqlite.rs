//! SQLite document store backend.
//!
//! Documents are rows of `(collection, key, value)` with the value stored
//! as serialized JSON. The equality filter deserializes and matches
//! client-side; collections here are small (hundreds to low thousands of
//! rows) and the store contract promises no secondary indexes.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::store::{merge_fields, DocumentStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key        TEXT NOT NULL,
    value      TEXT NOT NULL,
    PRIMARY KEY (collection, key)
);
";

/// Document store persisted in a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and initialize) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create data dir: {}", e)))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory SQLite store (testing convenience).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    async fn set(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&value)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO documents (collection, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, key) DO UPDATE SET value = excluded.value",
            params![collection, key, raw],
        )?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        })?;

        let mut doc: Value = serde_json::from_str(&raw)?;
        merge_fields(&mut doc, fields);
        conn.execute(
            "UPDATE documents SET value = ?3 WHERE collection = ?1 AND key = ?2",
            params![collection, key, serde_json::to_string(&doc)?],
        )?;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
        )?;
        Ok(changed > 0)
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT key, value FROM documents WHERE collection = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            out.push((key, serde_json::from_str(&raw)?));
        }
        Ok(out)
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("catalog.db")).unwrap();

        store
            .set("barcode_cache", "123", json!({"name": "Soap", "verified": false}))
            .await
            .unwrap();
        let doc = store.get("barcode_cache", "123").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Soap");
    }

    #[tokio::test]
    async fn set_is_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("c", "k", json!({"v": 1})).await.unwrap();
        store.set("c", "k", json!({"v": 2})).await.unwrap();
        assert_eq!(store.scan("c").await.unwrap().len(), 1);
        assert_eq!(
            store.get("c", "k").await.unwrap().unwrap()["v"],
            json!(2)
        );
    }

    #[tokio::test]
    async fn update_missing_key_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut fields = Map::new();
        fields.insert("a".to_string(), json!(1));
        let err = store.update("c", "nope", fields).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set("c", "k", json!({"verified": false, "name": "x"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("verified".to_string(), json!(true));
        store.update("c", "k", fields).await.unwrap();

        let doc = store.get("c", "k").await.unwrap().unwrap();
        assert_eq!(doc["verified"], json!(true));
        assert_eq!(doc["name"], "x");
    }

    #[tokio::test]
    async fn query_matches_equality_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set("c", "a", json!({"verified": false}))
            .await
            .unwrap();
        store
            .set("c", "b", json!({"verified": true}))
            .await
            .unwrap();

        let hits = store.query("c", "verified", &json!(false)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a");
    }

    #[tokio::test]
    async fn delete_then_scan_is_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("c", "k", json!(1)).await.unwrap();
        assert!(store.delete("c", "k").await.unwrap());
        assert!(store.scan("c").await.unwrap().is_empty());
    }
}
