//! The hosted role-assignment relation.
//!
//! Every call that reads or changes other principals' roles takes the
//! caller's [`AuthorizationContext`], so protected data cannot be reached
//! without an authorization decision. The PostgreSQL functions behind
//! [`super::PgRoleDirectory`] check the caller again at the data layer.

use async_trait::async_trait;
use chrono::Utc;
use service_core::authz::{AuthorizationContext, Principal, Role};
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{HostedUser, PrincipalRoles};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Principal not found")]
    UnknownPrincipal,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
            }
            DirectoryError::Forbidden => {
                AppError::Forbidden(anyhow::anyhow!("Insufficient permissions"))
            }
            DirectoryError::UnknownPrincipal => {
                AppError::NotFound(anyhow::anyhow!("Principal not found"))
            }
            DirectoryError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            DirectoryError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    /// The assignment already existed; nothing was written.
    RoleExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    NotAssigned,
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Record a hosted identity so admins can see it before it holds a role.
    async fn register_principal(&self, user: &HostedUser) -> Result<(), DirectoryError>;

    /// Union of the role rows for `user_id`. Empty means no elevated access.
    async fn roles_for(&self, user_id: Uuid) -> Result<BTreeSet<Role>, DirectoryError>;

    /// Every known principal with its roles. Admin only.
    async fn list_principals(
        &self,
        caller: &AuthorizationContext,
    ) -> Result<Vec<PrincipalRoles>, DirectoryError>;

    /// Admin only. Granting a held role reports `RoleExists`.
    async fn grant_role(
        &self,
        caller: &AuthorizationContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<GrantOutcome, DirectoryError>;

    /// Admin only. An admin may revoke their own roles, including the last admin role.
    async fn revoke_role(
        &self,
        caller: &AuthorizationContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<RevokeOutcome, DirectoryError>;
}

/// The caller's hosted id when it may manage roles.
///
/// Bearer principals never manage hosted roles, whatever their claim says.
pub fn admin_caller(caller: &AuthorizationContext) -> Result<Uuid, DirectoryError> {
    match caller.principal() {
        None => Err(DirectoryError::Unauthenticated),
        Some(Principal::Hosted(p)) if caller.is_admin() => Ok(p.id),
        Some(p) => {
            tracing::warn!(
                principal_id = %p.id(),
                scheme = ?p.scheme(),
                "Role management denied"
            );
            Err(DirectoryError::Forbidden)
        }
    }
}

#[derive(Debug, Clone)]
struct Profile {
    email: String,
    created_at: chrono::DateTime<Utc>,
}

/// In-process role directory for tests and local runs without a database.
#[derive(Default)]
pub struct MemoryRoleDirectory {
    profiles: Mutex<BTreeMap<Uuid, Profile>>,
    assignments: Mutex<BTreeSet<(Uuid, Role)>>,
}

impl MemoryRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an assignment without a caller, like a migration would.
    pub fn seed(&self, user: &HostedUser, roles: &[Role]) -> Result<(), DirectoryError> {
        self.profiles.lock().map_err(poisoned)?.insert(
            user.id,
            Profile {
                email: user.email.clone(),
                created_at: Utc::now(),
            },
        );
        let mut assignments = self.assignments.lock().map_err(poisoned)?;
        for role in roles {
            assignments.insert((user.id, *role));
        }
        Ok(())
    }

    /// Raw row count for `user_id`, for asserting that nothing was duplicated.
    pub fn assignment_count(&self, user_id: Uuid) -> usize {
        self.assignments
            .lock()
            .map(|a| a.iter().filter(|(id, _)| *id == user_id).count())
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> DirectoryError {
    DirectoryError::Internal(anyhow::anyhow!("role directory lock poisoned"))
}

#[async_trait]
impl RoleDirectory for MemoryRoleDirectory {
    async fn register_principal(&self, user: &HostedUser) -> Result<(), DirectoryError> {
        let mut profiles = self.profiles.lock().map_err(poisoned)?;
        profiles
            .entry(user.id)
            .and_modify(|p| p.email = user.email.clone())
            .or_insert_with(|| Profile {
                email: user.email.clone(),
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<BTreeSet<Role>, DirectoryError> {
        let assignments = self.assignments.lock().map_err(poisoned)?;
        Ok(assignments
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, role)| *role)
            .collect())
    }

    async fn list_principals(
        &self,
        caller: &AuthorizationContext,
    ) -> Result<Vec<PrincipalRoles>, DirectoryError> {
        admin_caller(caller)?;

        let profiles = self.profiles.lock().map_err(poisoned)?;
        let assignments = self.assignments.lock().map_err(poisoned)?;
        let mut principals: Vec<_> = profiles
            .iter()
            .map(|(id, profile)| PrincipalRoles {
                id: *id,
                email: profile.email.clone(),
                roles: assignments
                    .iter()
                    .filter(|(user_id, _)| user_id == id)
                    .map(|(_, role)| *role)
                    .collect(),
                created_at: Some(profile.created_at),
            })
            .collect();
        principals.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(principals)
    }

    async fn grant_role(
        &self,
        caller: &AuthorizationContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<GrantOutcome, DirectoryError> {
        let caller_id = admin_caller(caller)?;
        if !self.profiles.lock().map_err(poisoned)?.contains_key(&user_id) {
            return Err(DirectoryError::UnknownPrincipal);
        }

        let inserted = self
            .assignments
            .lock()
            .map_err(poisoned)?
            .insert((user_id, role));
        tracing::info!(caller_id = %caller_id, user_id = %user_id, role = %role, inserted, "Role grant");
        Ok(if inserted {
            GrantOutcome::Granted
        } else {
            GrantOutcome::RoleExists
        })
    }

    async fn revoke_role(
        &self,
        caller: &AuthorizationContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<RevokeOutcome, DirectoryError> {
        let caller_id = admin_caller(caller)?;

        let removed = self
            .assignments
            .lock()
            .map_err(poisoned)?
            .remove(&(user_id, role));
        tracing::info!(caller_id = %caller_id, user_id = %user_id, role = %role, removed, "Role revoke");
        Ok(if removed {
            RevokeOutcome::Revoked
        } else {
            RevokeOutcome::NotAssigned
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::authz::{BearerPrincipal, HostedPrincipal};

    fn user(email: &str) -> HostedUser {
        HostedUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
        }
    }

    fn context(user: &HostedUser, roles: &[Role]) -> AuthorizationContext {
        AuthorizationContext::authenticated(HostedPrincipal {
            id: user.id,
            email: user.email.clone(),
            roles: roles.iter().copied().collect(),
        })
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let directory = MemoryRoleDirectory::new();
        let admin = user("admin@parafia.example");
        let target = user("lector@parafia.example");
        directory.seed(&admin, &[Role::Admin]).unwrap();
        directory.register_principal(&target).await.unwrap();
        let caller = context(&admin, &[Role::Admin]);

        assert_eq!(
            directory.grant_role(&caller, target.id, Role::Editor).await.unwrap(),
            GrantOutcome::Granted
        );
        assert_eq!(
            directory.grant_role(&caller, target.id, Role::Editor).await.unwrap(),
            GrantOutcome::RoleExists
        );
        assert_eq!(directory.assignment_count(target.id), 1);
    }

    #[tokio::test]
    async fn test_admin_may_revoke_own_admin_role() {
        let directory = MemoryRoleDirectory::new();
        let admin = user("admin@parafia.example");
        directory.seed(&admin, &[Role::Admin]).unwrap();
        let caller = context(&admin, &[Role::Admin]);

        assert_eq!(
            directory.revoke_role(&caller, admin.id, Role::Admin).await.unwrap(),
            RevokeOutcome::Revoked
        );
        assert!(directory.roles_for(admin.id).await.unwrap().is_empty());
        assert_eq!(
            directory.revoke_role(&caller, admin.id, Role::Admin).await.unwrap(),
            RevokeOutcome::NotAssigned
        );
    }

    #[tokio::test]
    async fn test_editor_cannot_list_principals() {
        let directory = MemoryRoleDirectory::new();
        let editor = user("editor@parafia.example");
        directory.seed(&editor, &[Role::Editor]).unwrap();

        let result = directory
            .list_principals(&context(&editor, &[Role::Editor]))
            .await;

        assert!(matches!(result, Err(DirectoryError::Forbidden)));
    }

    #[tokio::test]
    async fn test_anonymous_and_bearer_callers_are_refused() {
        let directory = MemoryRoleDirectory::new();
        let bearer_admin = AuthorizationContext::authenticated(BearerPrincipal {
            id: Uuid::new_v4().to_string(),
            email: "api-admin@parafia.example".to_string(),
            role: Role::Admin,
        });

        assert!(matches!(
            directory.list_principals(&AuthorizationContext::unauthenticated()).await,
            Err(DirectoryError::Unauthenticated)
        ));
        assert!(matches!(
            directory.list_principals(&bearer_admin).await,
            Err(DirectoryError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_roles_are_the_union_of_rows() {
        let directory = MemoryRoleDirectory::new();
        let someone = user("both@parafia.example");
        directory.seed(&someone, &[Role::Editor, Role::Admin]).unwrap();

        let roles = directory.roles_for(someone.id).await.unwrap();

        assert_eq!(roles, BTreeSet::from([Role::Admin, Role::Editor]));
        assert!(directory.roles_for(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
