//! Per-request session bootstrap.
//!
//! Each scheme walks `Uninitialized -> Loading -> {Resolved, Unauthenticated}`
//! exactly once per request, before any guard looks at the result. A stored
//! credential that the issuing service refuses is purged here and nowhere
//! else.

use chrono::Utc;
use service_core::authz::{AuthorizationContext, Principal};
use std::sync::Arc;

use super::credential_store::CredentialStore;
use super::identity::{IdentityProvider, ProviderError};
use super::resolver::RoleResolver;
use crate::models::{HostedSession, HostedUser};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Resolved(Principal),
    Unauthenticated,
}

impl SessionState {
    /// Only a resolved session carries a principal. Every other state,
    /// including one still loading, is unauthenticated.
    pub fn authorization_context(&self) -> AuthorizationContext {
        match self {
            SessionState::Resolved(principal) => {
                AuthorizationContext::authenticated(principal.clone())
            }
            _ => AuthorizationContext::unauthenticated(),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Resolved(_) | SessionState::Unauthenticated)
    }
}

#[derive(Clone)]
pub struct SessionBootstrapper {
    identity: Arc<dyn IdentityProvider>,
    resolver: RoleResolver,
}

impl SessionBootstrapper {
    pub fn new(identity: Arc<dyn IdentityProvider>, resolver: RoleResolver) -> Self {
        Self { identity, resolver }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Restore the homily API session. Any failure purges the stored token.
    pub async fn bootstrap_ancillary(&self, store: &dyn CredentialStore) -> SessionState {
        let mut state = SessionState::Uninitialized;
        transition(&mut state, SessionState::Loading, "ancillary");

        let token = match store.get().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                transition(&mut state, SessionState::Unauthenticated, "ancillary");
                return state;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read bearer token slot");
                transition(&mut state, SessionState::Unauthenticated, "ancillary");
                return state;
            }
        };

        match self.resolver.resolve_ancillary(&token).await {
            Some(principal) => transition(&mut state, SessionState::Resolved(principal.into()), "ancillary"),
            None => {
                purge(store, "ancillary").await;
                transition(&mut state, SessionState::Unauthenticated, "ancillary");
            }
        }
        state
    }

    /// Restore the hosted provider session and attach its roles.
    ///
    /// An expired or refused access token gets one refresh attempt. The slot
    /// is purged when the provider refuses the session, but kept when the
    /// provider is merely unreachable.
    pub async fn bootstrap_hosted(&self, store: &dyn CredentialStore) -> SessionState {
        let mut state = SessionState::Uninitialized;
        transition(&mut state, SessionState::Loading, "hosted");

        let raw = match store.get().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                transition(&mut state, SessionState::Unauthenticated, "hosted");
                return state;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read hosted session slot");
                transition(&mut state, SessionState::Unauthenticated, "hosted");
                return state;
            }
        };

        let session: HostedSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Stored hosted session is malformed");
                purge(store, "hosted").await;
                transition(&mut state, SessionState::Unauthenticated, "hosted");
                return state;
            }
        };

        match self.restore_user(store, session).await {
            Ok(user) => {
                let principal = self.resolver.resolve_hosted(&user).await;
                transition(&mut state, SessionState::Resolved(principal.into()), "hosted");
            }
            Err(ProviderError::Unavailable) => {
                tracing::warn!("Identity provider unavailable, treating session as signed out");
                transition(&mut state, SessionState::Unauthenticated, "hosted");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Hosted session refused by provider");
                purge(store, "hosted").await;
                transition(&mut state, SessionState::Unauthenticated, "hosted");
            }
        }
        state
    }

    async fn restore_user(
        &self,
        store: &dyn CredentialStore,
        session: HostedSession,
    ) -> Result<HostedUser, ProviderError> {
        if session.expires_at > Utc::now().timestamp() {
            match self.identity.get_user(&session.access_token).await {
                Ok(user) => return Ok(user),
                Err(ProviderError::InvalidCredentials) => {}
                Err(e) => return Err(e),
            }
        }

        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(ProviderError::InvalidCredentials)?;
        let refreshed = self.identity.refresh_session(refresh_token).await?;

        match serde_json::to_string(&refreshed) {
            Ok(raw) => {
                if let Err(e) = store.set(&raw).await {
                    tracing::error!(error = %e, "Failed to store refreshed hosted session");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize refreshed hosted session"),
        }
        tracing::debug!(user_id = %refreshed.user.id, "Hosted session refreshed");
        Ok(refreshed.user)
    }
}

fn transition(state: &mut SessionState, next: SessionState, scheme: &'static str) {
    tracing::debug!(scheme, from = ?state, to = ?next, "Session state transition");
    if next.is_settled() {
        let outcome = match next {
            SessionState::Resolved(_) => "resolved",
            _ => "unauthenticated",
        };
        metrics::counter!("parish_session_bootstrap_total", "scheme" => scheme, "outcome" => outcome)
            .increment(1);
    }
    *state = next;
}

async fn purge(store: &dyn CredentialStore, scheme: &'static str) {
    tracing::info!(scheme, "Purging rejected credential");
    if let Err(e) = store.clear().await {
        tracing::error!(scheme, error = %e, "Failed to purge credential");
    }
}
