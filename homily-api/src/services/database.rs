//! PostgreSQL storage for the homily API.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use service_core::authz::Role;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use super::store::{HomilyStore, UserStore};
use super::ServiceError;
use crate::config::StorageConfig;
use crate::models::{normalize_email, ApiUser, Homily, UserRow};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run pending migrations.
    pub async fn connect(config: &StorageConfig) -> Result<Self, ServiceError> {
        let url = config.database_url.as_ref().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("DATABASE_URL is not configured"))
        })?;

        tracing::info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(url.expose_secret())
            .await?;
        tracing::info!("Successfully connected to PostgreSQL");

        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Migration failed: {}", e)))?;
        tracing::info!("Database migrations completed");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

#[async_trait]
impl UserStore for Database {
    async fn find_by_email(&self, email: &str) -> Result<Option<ApiUser>, ServiceError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM api_users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ApiUser::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiUser>, ServiceError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM api_users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ApiUser::try_from).transpose()?)
    }

    async fn list(&self) -> Result<Vec<ApiUser>, ServiceError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM api_users ORDER BY email")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| ApiUser::try_from(row).map_err(ServiceError::from))
            .collect()
    }

    async fn insert(&self, user: &ApiUser) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO api_users (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_bearer_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::EmailAlreadyRegistered
            } else {
                ServiceError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<ApiUser, ServiceError> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE api_users SET role = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role.as_bearer_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::UserNotFound)?;
        Ok(ApiUser::try_from(row)?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM api_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl HomilyStore for Database {
    async fn list(&self, include_unpublished: bool) -> Result<Vec<Homily>, ServiceError> {
        let homilies = sqlx::query_as::<_, Homily>(
            r#"
            SELECT * FROM homilies
            WHERE published OR $1
            ORDER BY preached_on DESC, created_at DESC
            "#,
        )
        .bind(include_unpublished)
        .fetch_all(&self.pool)
        .await?;
        Ok(homilies)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Homily>, ServiceError> {
        let homily = sqlx::query_as::<_, Homily>("SELECT * FROM homilies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(homily)
    }

    async fn insert(&self, homily: &Homily) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO homilies (id, title, preached_on, priest, audio_url, duration_seconds,
                                  description, published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(homily.id)
        .bind(&homily.title)
        .bind(homily.preached_on)
        .bind(&homily.priest)
        .bind(&homily.audio_url)
        .bind(homily.duration_seconds)
        .bind(&homily.description)
        .bind(homily.published)
        .bind(homily.created_at)
        .bind(homily.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, homily: &Homily) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE homilies
            SET title = $2, preached_on = $3, priest = $4, audio_url = $5,
                duration_seconds = $6, description = $7, published = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(homily.id)
        .bind(&homily.title)
        .bind(homily.preached_on)
        .bind(&homily.priest)
        .bind(&homily.audio_url)
        .bind(homily.duration_seconds)
        .bind(&homily.description)
        .bind(homily.published)
        .bind(homily.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::HomilyNotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM homilies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::HomilyNotFound);
        }
        Ok(())
    }
}
