//! Typed access to the persisted session: profile, onboarding position, transcript.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::conversation::message::Transcript;
use crate::error::DatabaseError;
use crate::onboarding::{OnboardingState, ProfileFacts};
use crate::store::traits::{NAMESPACE, SessionStore, keys};

/// Everything read back at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub facts: ProfileFacts,
    pub onboarding: OnboardingState,
    pub transcript: Transcript,
}

/// Session state persisted under the assistant namespace.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Load the saved session. Missing keys fall back to defaults; unreadable
    /// ones are dropped from the store and fall back too.
    pub async fn load(&self) -> Result<SessionSnapshot, DatabaseError> {
        let facts: ProfileFacts = self.read(keys::USER_DATA).await?.unwrap_or_default();
        let completed: bool = self.read(keys::ONBOARDING_COMPLETE).await?.unwrap_or(false);
        let step_index: usize = self.read(keys::ONBOARDING_STEP).await?.unwrap_or(0);
        let transcript: Transcript = self.read(keys::TRANSCRIPT).await?.unwrap_or_default();

        Ok(SessionSnapshot {
            facts,
            onboarding: OnboardingState {
                step_index,
                completed,
            },
            transcript,
        })
    }

    pub async fn save_facts(&self, facts: &ProfileFacts) -> Result<(), DatabaseError> {
        self.write(keys::USER_DATA, facts).await
    }

    pub async fn save_onboarding(&self, state: &OnboardingState) -> Result<(), DatabaseError> {
        self.write(keys::ONBOARDING_STEP, &state.step_index).await?;
        self.write(keys::ONBOARDING_COMPLETE, &state.completed).await
    }

    pub async fn save_transcript(&self, transcript: &Transcript) -> Result<(), DatabaseError> {
        self.write(keys::TRANSCRIPT, transcript).await
    }

    /// Remove every persisted session key.
    pub async fn clear(&self) -> Result<(), DatabaseError> {
        self.store.clear(NAMESPACE).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        let Some(value) = self.store.get(NAMESPACE, key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                tracing::warn!(key, "Dropping unreadable session value: {e}");
                self.store.delete(NAMESPACE, key).await?;
                Ok(None)
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let json =
            serde_json::to_value(value).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.store.set(NAMESPACE, key, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::Message;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn empty_store_loads_defaults() {
        let session = Session::new(Arc::new(InMemoryStore::new()));
        assert_eq!(session.load().await.unwrap(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn saves_roundtrip_under_namespace() {
        let store = Arc::new(InMemoryStore::new());
        let session = Session::new(store.clone());

        let facts = ProfileFacts {
            name: Some("Sam".into()),
            ..Default::default()
        };
        let state = OnboardingState {
            step_index: 2,
            completed: false,
        };
        let mut transcript = Transcript::new();
        transcript.push(Message::assistant("hello"));

        session.save_facts(&facts).await.unwrap();
        session.save_onboarding(&state).await.unwrap();
        session.save_transcript(&transcript).await.unwrap();

        assert_eq!(
            store.get(NAMESPACE, keys::USER_DATA).await.unwrap(),
            Some(serde_json::json!({"name": "Sam"}))
        );
        let loaded = session.load().await.unwrap();
        assert_eq!(loaded.facts, facts);
        assert_eq!(loaded.onboarding, state);
        assert_eq!(loaded.transcript, transcript);

        session.clear().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn corrupt_values_fall_back() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set(NAMESPACE, keys::TRANSCRIPT, &serde_json::json!("not a list"))
            .await
            .unwrap();
        store
            .set(NAMESPACE, keys::ONBOARDING_COMPLETE, &serde_json::json!(true))
            .await
            .unwrap();
        let loaded = Session::new(store.clone()).load().await.unwrap();
        assert!(loaded.transcript.is_empty());
        assert!(loaded.onboarding.completed);
        assert_eq!(store.get(NAMESPACE, keys::TRANSCRIPT).await.unwrap(), None);
        assert!(store.get(NAMESPACE, keys::ONBOARDING_COMPLETE).await.unwrap().is_some());
    }
}
