//! `SessionStore`: the key/value seam for persisted session state.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Namespace all assistant keys live under.
pub const NAMESPACE: &str = "paia";

/// Well-known session keys.
pub mod keys {
    pub const USER_DATA: &str = "user-data";
    pub const ONBOARDING_COMPLETE: &str = "onboarding-complete";
    pub const ONBOARDING_STEP: &str = "onboarding-step";
    pub const TRANSCRIPT: &str = "transcript";

    pub const ALL: [&str; 4] = [USER_DATA, ONBOARDING_COMPLETE, ONBOARDING_STEP, TRANSCRIPT];
}

/// Async JSON key/value storage scoped by namespace.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str)
    -> Result<Option<serde_json::Value>, DatabaseError>;

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Returns `true` if a value was removed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, DatabaseError>;

    /// Remove every key in the namespace.
    async fn clear(&self, namespace: &str) -> Result<(), DatabaseError>;
}
