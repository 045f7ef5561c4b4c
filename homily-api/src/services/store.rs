//! Storage seams. PostgreSQL in production, in-memory for tests and local runs.

use async_trait::async_trait;
use service_core::authz::Role;
use uuid::Uuid;

use super::ServiceError;
use crate::models::{ApiUser, Homily};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<ApiUser>, ServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiUser>, ServiceError>;
    async fn list(&self) -> Result<Vec<ApiUser>, ServiceError>;
    /// Fails with `EmailAlreadyRegistered` when the email is taken.
    async fn insert(&self, user: &ApiUser) -> Result<(), ServiceError>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<ApiUser, ServiceError>;
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;
    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait HomilyStore: Send + Sync {
    /// Newest first.
    async fn list(&self, include_unpublished: bool) -> Result<Vec<Homily>, ServiceError>;
    async fn get(&self, id: Uuid) -> Result<Option<Homily>, ServiceError>;
    async fn insert(&self, homily: &Homily) -> Result<(), ServiceError>;
    /// Fails with `HomilyNotFound` when no row matches.
    async fn update(&self, homily: &Homily) -> Result<(), ServiceError>;
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;
}
