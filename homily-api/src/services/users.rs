use secrecy::Secret;
use service_core::authz::Role;
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, UserStore};
use crate::dtos::users::CreateUserRequest;
use crate::models::{ApiUser, UserSummary};
use crate::utils::hash_password;

/// Account management for the homily API. Callers are admin-gated at the
/// route layer.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn list(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let users = self.users.list().await?;
        Ok(users.iter().map(ApiUser::summary).collect())
    }

    pub async fn create(&self, req: CreateUserRequest) -> Result<UserSummary, ServiceError> {
        let hash = hash_password(&Secret::new(req.password))?;
        let user = ApiUser::new(&req.email, hash, req.role);
        self.users.insert(&user).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user.summary())
    }

    /// Tokens already issued keep their old role until they expire.
    pub async fn change_role(&self, id: Uuid, role: Role) -> Result<UserSummary, ServiceError> {
        let user = self.users.update_role(id, role).await?;
        tracing::info!(user_id = %id, role = %role, "User role changed");
        Ok(user.summary())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.users.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}
