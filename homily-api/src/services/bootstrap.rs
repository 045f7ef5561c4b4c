use secrecy::ExposeSecret;
use service_core::authz::Role;

use super::{ServiceError, UserStore};
use crate::config::AdminBootstrapConfig;
use crate::models::ApiUser;
use crate::utils::hash_password;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyExists,
    Skipped,
}

/// Provision the first ADMIN account when one is configured and missing.
///
/// An existing account is left untouched, including its role and password.
pub async fn ensure_admin(
    users: &dyn UserStore,
    config: Option<&AdminBootstrapConfig>,
) -> Result<BootstrapOutcome, ServiceError> {
    let Some(config) = config else {
        tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin bootstrap");
        return Ok(BootstrapOutcome::Skipped);
    };

    if config.password.expose_secret().len() < 8 {
        tracing::warn!("ADMIN_PASSWORD is shorter than 8 characters, skipping admin bootstrap");
        return Ok(BootstrapOutcome::Skipped);
    }

    if users.find_by_email(&config.email).await?.is_some() {
        tracing::info!("Bootstrap admin already present");
        return Ok(BootstrapOutcome::AlreadyExists);
    }

    let hash = hash_password(&config.password)?;
    let admin = ApiUser::new(&config.email, hash, Role::Admin);
    match users.insert(&admin).await {
        Ok(()) => {
            tracing::info!(user_id = %admin.id, "Bootstrap admin created");
            Ok(BootstrapOutcome::Created)
        }
        // Another instance won the race.
        Err(ServiceError::EmailAlreadyRegistered) => Ok(BootstrapOutcome::AlreadyExists),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;
    use secrecy::Secret;

    fn bootstrap_config() -> AdminBootstrapConfig {
        AdminBootstrapConfig {
            email: "Admin@Parafia.example".to_string(),
            password: Secret::new("bootstrap-password".to_string()),
        }
    }

    #[tokio::test]
    async fn test_creates_admin_once() {
        let store = MemoryStore::new();
        let config = bootstrap_config();

        assert_eq!(
            ensure_admin(&store, Some(&config)).await.unwrap(),
            BootstrapOutcome::Created
        );
        assert_eq!(
            ensure_admin(&store, Some(&config)).await.unwrap(),
            BootstrapOutcome::AlreadyExists
        );

        let admin = store
            .find_by_email("admin@parafia.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_existing_account_keeps_its_role() {
        let store = MemoryStore::new();
        let existing = ApiUser::new("admin@parafia.example", "hash".to_string(), Role::Editor);
        store.insert(&existing).await.unwrap();

        let outcome = ensure_admin(&store, Some(&bootstrap_config())).await.unwrap();

        assert_eq!(outcome, BootstrapOutcome::AlreadyExists);
        let user = store.find_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Editor);
    }

    #[tokio::test]
    async fn test_missing_config_is_skipped() {
        let store = MemoryStore::new();
        assert_eq!(
            ensure_admin(&store, None).await.unwrap(),
            BootstrapOutcome::Skipped
        );
        assert!(store.list().await.unwrap().is_empty());
    }
}
