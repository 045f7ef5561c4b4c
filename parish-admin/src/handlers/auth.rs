//! Hosted-scheme sign-in, sign-up, password reset and sign-out.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use secrecy::Secret;
use serde::Deserialize;
use tower_sessions::Session;

use crate::models::HostedSession;
use crate::services::{CredentialStore, ProviderError, SessionCredentialStore, SignUpOutcome};
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const SERVICE_UNAVAILABLE: &str = "Service unavailable, try again later";
const REGISTRATION_FAILED: &str = "Registration failed. Email might already be in use.";
const CONFIRM_EMAIL: &str = "Registration successful! Please check your email to confirm your account.";
const RESET_SENT: &str = "If an account exists for that email, a password reset link has been sent.";
const SIGNED_OUT: &str = "You have been signed out.";

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Deserialize)]
pub struct PasswordResetForm {
    pub email: String,
}

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    #[serde(default)]
    pub signed_out: bool,
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: None,
        notice: query.signed_out.then(|| SIGNED_OUT.to_string()),
    }
}

pub async fn register_page() -> impl IntoResponse {
    RegisterTemplate {
        error: None,
        notice: None,
    }
}

fn login_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        LoginTemplate {
            error: Some(message.to_string()),
            notice: None,
        },
    )
        .into_response()
}

/// Keep the provider session in the hosted slot and rotate the session id.
async fn establish(
    state: &AppState,
    session: Session,
    hosted: &HostedSession,
) -> Result<(), anyhow::Error> {
    if let Err(e) = state.roles.register_principal(&hosted.user).await {
        tracing::error!(user_id = %hosted.user.id, error = %e, "Failed to record principal");
    }

    session
        .cycle_id()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to rotate session id: {}", e))?;
    let raw = serde_json::to_string(hosted)?;
    SessionCredentialStore::hosted(session).set(&raw).await
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let email = form.email.trim();

    match state.identity.sign_in_with_password(email, &form.password).await {
        Ok(hosted) => {
            if let Err(e) = establish(&state, session, &hosted).await {
                tracing::error!(error = %e, "Failed to establish session");
                return login_error(StatusCode::INTERNAL_SERVER_ERROR, SERVICE_UNAVAILABLE);
            }
            metrics::counter!("parish_sign_in_total", "scheme" => "hosted", "outcome" => "success")
                .increment(1);
            tracing::info!(user_id = %hosted.user.id, "Hosted sign-in succeeded");
            Redirect::to("/admin").into_response()
        }
        Err(ProviderError::Unavailable) => {
            metrics::counter!("parish_sign_in_total", "scheme" => "hosted", "outcome" => "unavailable")
                .increment(1);
            login_error(StatusCode::SERVICE_UNAVAILABLE, SERVICE_UNAVAILABLE)
        }
        Err(e) => {
            metrics::counter!("parish_sign_in_total", "scheme" => "hosted", "outcome" => "rejected")
                .increment(1);
            tracing::warn!(error = %e, "Hosted sign-in failed");
            login_error(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS)
        }
    }
}

pub async fn register_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let email = form.email.trim();

    let (status, error, notice) = match state.identity.sign_up(email, &form.password).await {
        Ok(SignUpOutcome::SignedIn(hosted)) => {
            if let Err(e) = establish(&state, session, &hosted).await {
                tracing::error!(error = %e, "Failed to establish session after sign-up");
                (StatusCode::INTERNAL_SERVER_ERROR, Some(SERVICE_UNAVAILABLE), None)
            } else {
                tracing::info!(user_id = %hosted.user.id, "Hosted sign-up succeeded");
                return Redirect::to("/admin").into_response();
            }
        }
        Ok(SignUpOutcome::ConfirmationRequired) => (StatusCode::OK, None, Some(CONFIRM_EMAIL)),
        Err(ProviderError::Unavailable) => {
            (StatusCode::SERVICE_UNAVAILABLE, Some(SERVICE_UNAVAILABLE), None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Hosted sign-up failed");
            (StatusCode::UNPROCESSABLE_ENTITY, Some(REGISTRATION_FAILED), None)
        }
    };

    (
        status,
        RegisterTemplate {
            error: error.map(str::to_string),
            notice: notice.map(str::to_string),
        },
    )
        .into_response()
}

/// The response never reveals whether the address is known.
pub async fn password_reset_handler(
    State(state): State<AppState>,
    Form(form): Form<PasswordResetForm>,
) -> impl IntoResponse {
    if let Err(e) = state.identity.request_password_reset(form.email.trim()).await {
        tracing::warn!(error = %e, "Password reset request failed");
    }

    LoginTemplate {
        error: None,
        notice: Some(RESET_SENT.to_string()),
    }
}

/// Local state goes first; remote revocation is best effort.
pub async fn logout_handler(State(state): State<AppState>, session: Session) -> Redirect {
    let store = SessionCredentialStore::hosted(session);

    let access_token = match store.get().await {
        Ok(raw) => raw
            .and_then(|raw| serde_json::from_str::<HostedSession>(&raw).ok())
            .map(|hosted| hosted.access_token),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read hosted session during sign-out");
            None
        }
    };

    if let Err(e) = store.clear().await {
        tracing::error!(error = %e, "Failed to clear hosted session");
    }

    if let Some(token) = access_token {
        if let Err(e) = state.identity.sign_out(&token).await {
            tracing::warn!(error = %e, "Remote sign-out failed, local session already cleared");
        }
    }

    Redirect::to("/login?signed_out=true")
}
