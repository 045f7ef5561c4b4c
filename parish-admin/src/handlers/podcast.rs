//! Podcast manager pages, signed in against the homily API.

use askama::Template;
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use secrecy::Secret;
use serde::Deserialize;
use service_core::authz::Principal;
use service_core::middleware::rate_limit::client_ip;
use std::net::SocketAddr;
use tower_sessions::Session;

use crate::models::HomilySummary;
use crate::services::{AncillaryError, CredentialStore, SessionCredentialStore};
use crate::AppState;

/// One message for every failure, so the page says nothing about which
/// part was wrong.
const SIGN_IN_FAILED: &str = "Invalid credentials or API unavailable";

#[derive(Template)]
#[template(path = "podcast_login.html")]
pub struct PodcastLoginTemplate {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "podcast.html")]
pub struct PodcastTemplate {
    pub email: String,
    pub role: String,
    pub homilies: Vec<HomilySummary>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct PodcastLoginForm {
    pub email: String,
    pub password: Secret<String>,
}

pub async fn login_page() -> impl IntoResponse {
    PodcastLoginTemplate { error: None }
}

pub async fn login_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    session: Session,
    Form(form): Form<PodcastLoginForm>,
) -> Response {
    let failed = |status: StatusCode| {
        (
            status,
            PodcastLoginTemplate {
                error: Some(SIGN_IN_FAILED.to_string()),
            },
        )
            .into_response()
    };

    let visitor = client_ip(
        connect_info.map(|ConnectInfo(addr)| addr.ip()),
        &headers,
        &state.trusted_proxies,
    );

    let login = match state
        .ancillary
        .login(form.email.trim(), &form.password, visitor)
        .await
    {
        Ok(login) => login,
        Err(e) => {
            let outcome = match e {
                AncillaryError::RateLimited => "rate_limited",
                AncillaryError::Unavailable => "unavailable",
                AncillaryError::Rejected(_) => "rejected",
            };
            metrics::counter!("parish_sign_in_total", "scheme" => "ancillary", "outcome" => outcome)
                .increment(1);
            tracing::warn!(error = %e, "Podcast sign-in failed");
            let status = match e {
                AncillaryError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::UNAUTHORIZED,
            };
            return failed(status);
        }
    };

    if let Err(e) = session.cycle_id().await {
        tracing::error!(error = %e, "Failed to rotate session id");
        return failed(StatusCode::INTERNAL_SERVER_ERROR);
    }
    if let Err(e) = SessionCredentialStore::ancillary(session).set(&login.token).await {
        tracing::error!(error = %e, "Failed to store bearer token");
        return failed(StatusCode::INTERNAL_SERVER_ERROR);
    }

    metrics::counter!("parish_sign_in_total", "scheme" => "ancillary", "outcome" => "success")
        .increment(1);
    tracing::info!(user_id = %login.user.id, role = %login.user.role, "Podcast sign-in succeeded");
    Redirect::to("/podcast").into_response()
}

/// Bearer tokens have no server-side revocation; dropping the slot ends the session.
pub async fn logout_handler(session: Session) -> Redirect {
    if let Err(e) = SessionCredentialStore::ancillary(session).clear().await {
        tracing::error!(error = %e, "Failed to clear bearer token");
    }
    Redirect::to("/podcast/login")
}

pub async fn home(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> impl IntoResponse {
    let role = principal
        .roles()
        .iter()
        .map(|r| r.as_bearer_str())
        .collect::<Vec<_>>()
        .join(", ");

    let (homilies, error) = match state.ancillary.list_homilies().await {
        Ok(homilies) => (homilies, None),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load homilies");
            (Vec::new(), Some("Could not load homilies.".to_string()))
        }
    };

    PodcastTemplate {
        email: principal.email().to_string(),
        role,
        homilies,
        error,
    }
}
