//! Page guards.
//!
//! The session is fully bootstrapped before any decision is made. No
//! principal means a redirect to that scheme's sign-in page; a principal
//! without the required role gets the access-denied page, which offers a
//! sign-out.

use askama::Template;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use service_core::authz::{AuthorizationContext, Role};
use tower_sessions::Session;

use crate::services::{SessionCredentialStore, SessionState};
use crate::AppState;

#[derive(Template)]
#[template(path = "access_denied.html")]
pub struct AccessDeniedTemplate {
    pub email: String,
    pub required: &'static str,
    pub sign_out_action: &'static str,
}

#[derive(Clone, Copy)]
struct Surface {
    sign_in: &'static str,
    sign_out: &'static str,
}

const DASHBOARD: Surface = Surface {
    sign_in: "/login",
    sign_out: "/logout",
};

const PODCAST: Surface = Surface {
    sign_in: "/podcast/login",
    sign_out: "/podcast/logout",
};

/// Dashboard pages: hosted scheme, editor or above.
pub async fn require_dashboard_access(
    State(state): State<AppState>,
    session: Session,
    req: Request,
    next: Next,
) -> Response {
    let store = SessionCredentialStore::hosted(session);
    let session_state = state.bootstrapper.bootstrap_hosted(&store).await;
    admit(session_state, DASHBOARD, req, next).await
}

/// Podcast pages: homily API bearer token, editor or above.
pub async fn require_podcast_access(
    State(state): State<AppState>,
    session: Session,
    req: Request,
    next: Next,
) -> Response {
    let store = SessionCredentialStore::ancillary(session);
    let session_state = state.bootstrapper.bootstrap_ancillary(&store).await;
    admit(session_state, PODCAST, req, next).await
}

/// Admin-only pages. Runs inside `require_dashboard_access`.
pub async fn require_admin_page(req: Request, next: Next) -> Response {
    let ctx = req
        .extensions()
        .get::<AuthorizationContext>()
        .cloned()
        .unwrap_or_default();

    match ctx.principal() {
        None => Redirect::to(DASHBOARD.sign_in).into_response(),
        Some(principal) if !ctx.is_admin() => {
            tracing::warn!(principal_id = %principal.id(), path = %req.uri().path(), "Admin page denied");
            access_denied(principal.email(), Role::Admin, DASHBOARD)
        }
        Some(_) => next.run(req).await,
    }
}

async fn admit(session_state: SessionState, surface: Surface, mut req: Request, next: Next) -> Response {
    let ctx = session_state.authorization_context();

    let Some(principal) = ctx.principal().cloned() else {
        tracing::debug!(path = %req.uri().path(), "No session, redirecting to sign-in");
        return Redirect::to(surface.sign_in).into_response();
    };

    if !ctx.is_editor() {
        tracing::warn!(
            principal_id = %principal.id(),
            scheme = ?principal.scheme(),
            path = %req.uri().path(),
            "Page access denied"
        );
        return access_denied(principal.email(), Role::Editor, surface);
    }

    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(principal);
    next.run(req).await
}

fn access_denied(email: &str, required: Role, surface: Surface) -> Response {
    let template = AccessDeniedTemplate {
        email: email.to_string(),
        required: required.as_hosted_str(),
        sign_out_action: surface.sign_out,
    };
    (StatusCode::FORBIDDEN, template).into_response()
}
