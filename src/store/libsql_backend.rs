//! libSQL backend for `SessionStore`.
//!
//! Values are stored as JSON text in the `settings` table, keyed by
//! `(namespace, key)`. Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::SessionStore;

/// libSQL session store.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl SessionStore for LibSqlStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM settings WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get: {e}")))?;
                let value = serde_json::from_str(&value_str)
                    .map_err(|e| DatabaseError::Serialization(format!("{namespace}/{key}: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get: {e}"))),
        }
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO settings (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (namespace, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![namespace, key, value_str, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set: {e}")))?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM settings WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete: {e}")))?;
        Ok(count > 0)
    }

    async fn clear(&self, namespace: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM settings WHERE namespace = ?1", params![namespace])
            .await
            .map_err(|e| DatabaseError::Query(format!("clear: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn settings_crud() {
        let db = test_db().await;
        let value = serde_json::json!({"name": "Sam", "focusArea": "career"});

        db.set("paia", "user-data", &value).await.unwrap();
        assert_eq!(db.get("paia", "user-data").await.unwrap(), Some(value));

        let updated = serde_json::json!({"name": "Sam"});
        db.set("paia", "user-data", &updated).await.unwrap();
        assert_eq!(db.get("paia", "user-data").await.unwrap(), Some(updated));

        assert!(db.delete("paia", "user-data").await.unwrap());
        assert!(!db.delete("paia", "user-data").await.unwrap());
        assert_eq!(db.get("paia", "user-data").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_only_touches_namespace() {
        let db = test_db().await;
        db.set("paia", "a", &serde_json::json!(true)).await.unwrap();
        db.set("paia", "b", &serde_json::json!(3)).await.unwrap();
        db.set("other", "a", &serde_json::json!("keep")).await.unwrap();

        db.clear("paia").await.unwrap();
        assert_eq!(db.get("paia", "a").await.unwrap(), None);
        assert_eq!(db.get("paia", "b").await.unwrap(), None);
        assert_eq!(
            db.get("other", "a").await.unwrap(),
            Some(serde_json::json!("keep"))
        );
    }

    #[tokio::test]
    async fn file_database_persists_across_opens() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/felicia.db");

        {
            let db = LibSqlStore::new_local(&path).await.unwrap();
            db.set("paia", "onboarding-complete", &serde_json::json!(true))
                .await
                .unwrap();
        }

        let reopened = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(
            reopened.get("paia", "onboarding-complete").await.unwrap(),
            Some(serde_json::json!(true))
        );
    }
}
