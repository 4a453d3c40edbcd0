//! In-memory `SessionStore`, for tests and for running without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::SessionStore;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored across all namespaces.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        self.entries
            .write()
            .await
            .insert((namespace.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .entries
            .write()
            .await
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    async fn clear(&self, namespace: &str) -> Result<(), DatabaseError> {
        self.entries.write().await.retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}
