//! Client for the homily API's own bearer-token scheme.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use service_core::middleware::rate_limit::FORWARDED_FOR_HEADER;
use service_core::observability::TracedClientExt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::AncillarySettings;
use crate::models::{AncillaryLogin, AncillaryUser, HomilySummary};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AncillaryError {
    #[error("Rejected by homily API with status {0}")]
    Rejected(u16),

    #[error("Too many attempts")]
    RateLimited,

    #[error("Homily API unavailable")]
    Unavailable,
}

#[async_trait]
pub trait AncillaryApi: Send + Sync {
    /// Sign in on behalf of the visitor at `client_ip`, so the API's login
    /// budget is spent per visitor rather than per dashboard.
    async fn login(
        &self,
        email: &str,
        password: &Secret<String>,
        client_ip: Option<IpAddr>,
    ) -> Result<AncillaryLogin, AncillaryError>;

    /// Ask the server whether it still accepts `token`.
    async fn me(&self, token: &str) -> Result<AncillaryUser, AncillaryError>;

    async fn list_homilies(&self) -> Result<Vec<HomilySummary>, AncillaryError>;
}

pub struct HomilyApiClient {
    client: Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
struct MeResponse {
    user: AncillaryUser,
}

impl HomilyApiClient {
    pub fn new(settings: &AncillarySettings) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn unavailable(err: reqwest::Error) -> AncillaryError {
    tracing::error!(error = %err, "Homily API request failed");
    AncillaryError::Unavailable
}

fn rejection(status: StatusCode) -> AncillaryError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AncillaryError::RateLimited,
        s if s.is_server_error() => AncillaryError::Unavailable,
        s => AncillaryError::Rejected(s.as_u16()),
    }
}

#[async_trait]
impl AncillaryApi for HomilyApiClient {
    async fn login(
        &self,
        email: &str,
        password: &Secret<String>,
        client_ip: Option<IpAddr>,
    ) -> Result<AncillaryLogin, AncillaryError> {
        let mut request = self
            .client
            .traced_post(&self.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password.expose_secret() }));
        if let Some(ip) = client_ip {
            request = request.header(FORWARDED_FOR_HEADER, &ip.to_string());
        }

        let response = request.send().await.map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response.status()));
        }

        response.json().await.map_err(unavailable)
    }

    async fn me(&self, token: &str) -> Result<AncillaryUser, AncillaryError> {
        let response = self
            .client
            .traced_get(&self.url("/api/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response.status()));
        }

        response
            .json::<MeResponse>()
            .await
            .map(|res| res.user)
            .map_err(unavailable)
    }

    async fn list_homilies(&self) -> Result<Vec<HomilySummary>, AncillaryError> {
        let response = self
            .client
            .traced_get(&self.url("/api/homilies"))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response.status()));
        }

        response.json().await.map_err(unavailable)
    }
}
