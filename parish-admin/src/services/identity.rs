//! Client for the hosted identity provider (GoTrue REST API).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::time::Duration;
use thiserror::Error;

use crate::config::HostedSettings;
use crate::models::{HostedSession, HostedUser};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Wrong email/password, or a session the provider no longer accepts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity provider unavailable")]
    Unavailable,

    #[error("Rejected by identity provider: {0}")]
    Rejected(String),
}

/// Result of a sign-up. With email confirmation on, no session is issued.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(HostedSession),
    ConfirmationRequired,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<HostedSession, ProviderError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<SignUpOutcome, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Validate an access token and return its user.
    async fn get_user(&self, access_token: &str) -> Result<HostedUser, ProviderError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<HostedSession, ProviderError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), ProviderError>;
}

pub struct GoTrueClient {
    client: Client,
    base_url: String,
    anon_key: Secret<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: HostedUser,
}

impl From<TokenResponse> for HostedSession {
    fn from(res: TokenResponse) -> Self {
        HostedSession {
            access_token: res.access_token,
            refresh_token: res.refresh_token,
            expires_at: res
                .expires_at
                .unwrap_or_else(|| Utc::now().timestamp() + res.expires_in),
            user: res.user,
        }
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl GoTrueClient {
    pub fn new(settings: &HostedSettings) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<HostedSession, ProviderError> {
        let url = self.endpoint(&format!("/token?grant_type={}", grant_type));
        let response = self
            .client
            .traced_post(&url)
            .header("apikey", self.anon_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(classify(response).await);
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed token response from identity provider");
            ProviderError::Unavailable
        })?;
        Ok(token.into())
    }
}

fn unavailable(err: reqwest::Error) -> ProviderError {
    tracing::error!(error = %err, "Identity provider request failed");
    ProviderError::Unavailable
}

/// Map a non-success response onto the three outcomes callers care about.
async fn classify(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(status = %status, "Identity provider unavailable");
        return ProviderError::Unavailable;
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::InvalidCredentials;
    }

    let body: ErrorBody = response.json().await.unwrap_or_default();
    let invalid_grant = body.error.as_deref() == Some("invalid_grant")
        || body.error_code.as_deref() == Some("invalid_credentials");
    if invalid_grant {
        return ProviderError::InvalidCredentials;
    }

    let message = body
        .error_description
        .or(body.msg)
        .or(body.error)
        .unwrap_or_else(|| status.to_string());
    ProviderError::Rejected(message)
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<HostedSession, ProviderError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password.expose_secret() }),
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<SignUpOutcome, ProviderError> {
        let response = self
            .client
            .traced_post(&self.endpoint("/signup"))
            .header("apikey", self.anon_key.expose_secret())
            .json(&serde_json::json!({ "email": email, "password": password.expose_secret() }))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(classify(response).await);
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed sign-up response from identity provider");
            ProviderError::Unavailable
        })?;

        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body).map_err(|e| {
                tracing::error!(error = %e, "Malformed sign-up session from identity provider");
                ProviderError::Unavailable
            })?;
            Ok(SignUpOutcome::SignedIn(token.into()))
        } else {
            Ok(SignUpOutcome::ConfirmationRequired)
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .traced_post(&self.endpoint("/logout"))
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(unavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify(response).await)
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<HostedUser, ProviderError> {
        let response = self
            .client
            .traced_get(&self.endpoint("/user"))
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(classify(response).await);
        }

        response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed user response from identity provider");
            ProviderError::Unavailable
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<HostedSession, ProviderError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .traced_post(&self.endpoint("/recover"))
            .header("apikey", self.anon_key.expose_secret())
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(unavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify(response).await)
        }
    }
}
