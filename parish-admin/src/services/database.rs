//! PostgreSQL role directory. List and manage go through the SQL functions
//! `get_users_with_roles` and `manage_user_role`, which re-check the caller
//! against `user_roles` themselves.
//!
//! Every call runs in its own transaction as `parish_admin_app` with
//! `app.current_user_id` set to the acting principal, so the row-level
//! policies decide what a direct query may see or write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use service_core::authz::{AuthorizationContext, Role};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

use super::role_directory::{
    admin_caller, DirectoryError, GrantOutcome, RevokeOutcome, RoleDirectory,
};
use crate::config::DatabaseSettings;
use crate::models::{HostedUser, PrincipalRoles};

const INSUFFICIENT_PRIVILEGE: &str = "42501";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// `parish_admin_app` is created by the migrations and never bypasses
/// row-level security.
const ASSUME_RUNTIME_ROLE: &str = "SET LOCAL ROLE parish_admin_app";

#[derive(Clone)]
pub struct PgRoleDirectory {
    pool: PgPool,
}

#[derive(FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    created_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl PgRoleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DirectoryError> {
        let url = settings.url.as_ref().ok_or_else(|| {
            DirectoryError::Internal(anyhow::anyhow!("database.url is not configured"))
        })?;

        tracing::info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url.expose_secret())
            .await?;

        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DirectoryError::Internal(anyhow::anyhow!("Migration failed: {}", e)))?;
        tracing::info!("Database migrations completed");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a transaction acting as `principal` under the runtime role.
    /// Both settings end with the transaction.
    async fn scoped(
        &self,
        principal: Uuid,
    ) -> Result<Transaction<'static, Postgres>, DirectoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(ASSUME_RUNTIME_ROLE).execute(&mut *tx).await?;
        sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
            .bind(principal.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

fn sql_state(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Turn a data-layer refusal into the matching directory error.
fn map_function_error(err: sqlx::Error) -> DirectoryError {
    match sql_state(&err).as_deref() {
        Some(INSUFFICIENT_PRIVILEGE) => DirectoryError::Forbidden,
        Some(FOREIGN_KEY_VIOLATION) => DirectoryError::UnknownPrincipal,
        _ => DirectoryError::Database(err),
    }
}

fn parse_roles(user_id: Uuid, raw: &[String]) -> BTreeSet<Role> {
    raw.iter()
        .filter_map(|r| match r.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Ignoring unknown role row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn register_principal(&self, user: &HostedUser) -> Result<(), DirectoryError> {
        let mut tx = self.scoped(user.id).await?;
        sqlx::query(
            r#"
            INSERT INTO profiles (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<BTreeSet<Role>, DirectoryError> {
        let mut tx = self.scoped(user_id).await?;
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT role::text FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(parse_roles(user_id, &rows))
    }

    async fn list_principals(
        &self,
        caller: &AuthorizationContext,
    ) -> Result<Vec<PrincipalRoles>, DirectoryError> {
        let caller_id = admin_caller(caller)?;

        let mut tx = self.scoped(caller_id).await?;
        let rows = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, email, created_at, roles FROM get_users_with_roles($1)",
        )
        .bind(caller_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_function_error)?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| PrincipalRoles {
                roles: parse_roles(row.id, &row.roles),
                id: row.id,
                email: row.email,
                created_at: Some(row.created_at),
            })
            .collect())
    }

    async fn grant_role(
        &self,
        caller: &AuthorizationContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<GrantOutcome, DirectoryError> {
        let caller_id = admin_caller(caller)?;

        let mut tx = self.scoped(caller_id).await?;
        let outcome: String =
            sqlx::query_scalar("SELECT manage_user_role($1, $2, $3::app_role, 'add')")
                .bind(caller_id)
                .bind(user_id)
                .bind(role.as_hosted_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(map_function_error)?;
        tx.commit().await?;

        tracing::info!(caller_id = %caller_id, user_id = %user_id, role = %role, outcome = %outcome, "Role grant");
        match outcome.as_str() {
            "granted" => Ok(GrantOutcome::Granted),
            "role_exists" => Ok(GrantOutcome::RoleExists),
            other => Err(DirectoryError::Internal(anyhow::anyhow!(
                "unexpected manage_user_role result: {}",
                other
            ))),
        }
    }

    async fn revoke_role(
        &self,
        caller: &AuthorizationContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<RevokeOutcome, DirectoryError> {
        let caller_id = admin_caller(caller)?;

        let mut tx = self.scoped(caller_id).await?;
        let outcome: String =
            sqlx::query_scalar("SELECT manage_user_role($1, $2, $3::app_role, 'remove')")
                .bind(caller_id)
                .bind(user_id)
                .bind(role.as_hosted_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(map_function_error)?;
        tx.commit().await?;

        tracing::info!(caller_id = %caller_id, user_id = %user_id, role = %role, outcome = %outcome, "Role revoke");
        match outcome.as_str() {
            "revoked" => Ok(RevokeOutcome::Revoked),
            "not_assigned" => Ok(RevokeOutcome::NotAssigned),
            other => Err(DirectoryError::Internal(anyhow::anyhow!(
                "unexpected manage_user_role result: {}",
                other
            ))),
        }
    }
}
