use async_trait::async_trait;
use service_core::authz::Role;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::store::{HomilyStore, UserStore};
use super::ServiceError;
use crate::models::{normalize_email, ApiUser, Homily};

/// In-process store for tests and `STORAGE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, ApiUser>>,
    homilies: Mutex<HashMap<Uuid, Homily>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("memory store lock poisoned"))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<ApiUser>, ServiceError> {
        let email = normalize_email(email);
        let users = self.users.lock().map_err(poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiUser>, ServiceError> {
        Ok(self.users.lock().map_err(poisoned)?.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<ApiUser>, ServiceError> {
        let mut users: Vec<_> = self.users.lock().map_err(poisoned)?.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn insert(&self, user: &ApiUser) -> Result<(), ServiceError> {
        let mut users = self.users.lock().map_err(poisoned)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(ServiceError::EmailAlreadyRegistered);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<ApiUser, ServiceError> {
        let mut users = self.users.lock().map_err(poisoned)?;
        let user = users.get_mut(&id).ok_or(ServiceError::UserNotFound)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.users
            .lock()
            .map_err(poisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(ServiceError::UserNotFound)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[async_trait]
impl HomilyStore for MemoryStore {
    async fn list(&self, include_unpublished: bool) -> Result<Vec<Homily>, ServiceError> {
        let mut homilies: Vec<_> = self
            .homilies
            .lock()
            .map_err(poisoned)?
            .values()
            .filter(|h| include_unpublished || h.published)
            .cloned()
            .collect();
        homilies.sort_by(|a, b| {
            b.preached_on
                .cmp(&a.preached_on)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(homilies)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Homily>, ServiceError> {
        Ok(self.homilies.lock().map_err(poisoned)?.get(&id).cloned())
    }

    async fn insert(&self, homily: &Homily) -> Result<(), ServiceError> {
        self.homilies
            .lock()
            .map_err(poisoned)?
            .insert(homily.id, homily.clone());
        Ok(())
    }

    async fn update(&self, homily: &Homily) -> Result<(), ServiceError> {
        let mut homilies = self.homilies.lock().map_err(poisoned)?;
        match homilies.get_mut(&homily.id) {
            Some(existing) => {
                *existing = homily.clone();
                Ok(())
            }
            None => Err(ServiceError::HomilyNotFound),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.homilies
            .lock()
            .map_err(poisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(ServiceError::HomilyNotFound)
    }
}
