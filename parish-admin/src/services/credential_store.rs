//! One credential slot per scheme.
//!
//! The store holds an opaque string. It never looks inside and never checks
//! expiry; deciding whether a credential is still good belongs to the
//! session bootstrapper.

use async_trait::async_trait;
use std::sync::Mutex;
use tower_sessions::Session;

pub const ANCILLARY_TOKEN_KEY: &str = "ancillary_token";
pub const HOSTED_SESSION_KEY: &str = "hosted_session";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, value: &str) -> Result<(), anyhow::Error>;
    async fn clear(&self) -> Result<(), anyhow::Error>;
}

/// Slot backed by a key in the caller's server-side session.
#[derive(Clone)]
pub struct SessionCredentialStore {
    session: Session,
    key: &'static str,
}

impl SessionCredentialStore {
    pub fn new(session: Session, key: &'static str) -> Self {
        Self { session, key }
    }

    pub fn ancillary(session: Session) -> Self {
        Self::new(session, ANCILLARY_TOKEN_KEY)
    }

    pub fn hosted(session: Session) -> Self {
        Self::new(session, HOSTED_SESSION_KEY)
    }
}

#[async_trait]
impl CredentialStore for SessionCredentialStore {
    async fn get(&self) -> Result<Option<String>, anyhow::Error> {
        self.session
            .get::<String>(self.key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {} from session: {}", self.key, e))
    }

    async fn set(&self, value: &str) -> Result<(), anyhow::Error> {
        self.session
            .insert(self.key, value)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {} to session: {}", self.key, e))
    }

    async fn clear(&self) -> Result<(), anyhow::Error> {
        self.session
            .remove::<String>(self.key)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Failed to clear {} from session: {}", self.key, e))
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        Self {
            slot: Mutex::new(Some(value.to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<String>, anyhow::Error> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot lock poisoned"))?;
        Ok(slot.clone())
    }

    async fn set(&self, value: &str) -> Result<(), anyhow::Error> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot lock poisoned"))?;
        *slot = Some(value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), anyhow::Error> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_slot_round_trip() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get().await.unwrap(), None);

        store.set("token").await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some("token".to_string()));

        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_slots_are_independent() {
        let session = Session::new(
            None,
            std::sync::Arc::new(tower_sessions::MemoryStore::default()),
            None,
        );
        let hosted = SessionCredentialStore::hosted(session.clone());
        let ancillary = SessionCredentialStore::ancillary(session);

        hosted.set("hosted-json").await.unwrap();
        ancillary.set("bearer").await.unwrap();
        ancillary.clear().await.unwrap();

        assert_eq!(hosted.get().await.unwrap(), Some("hosted-json".to_string()));
        assert_eq!(ancillary.get().await.unwrap(), None);
    }
}
