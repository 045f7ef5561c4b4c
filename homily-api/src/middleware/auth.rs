use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::authz::{AuthorizationContext, Role};
use service_core::error::AppError;

use crate::{services::BearerClaims, AppState};

/// Validate `Authorization: Bearer` and attach the caller's claims and
/// authorization context to the request.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.validate_token(token)?;

    let context = AuthorizationContext::authenticated(claims.principal());
    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// A request that skipped `bearer_auth_middleware` is treated as anonymous.
fn context_of(req: &Request) -> AuthorizationContext {
    req.extensions()
        .get::<AuthorizationContext>()
        .cloned()
        .unwrap_or_default()
}

async fn require(role: Role, req: Request, next: Next) -> Result<Response, AppError> {
    context_of(&req).require_role(role)?;
    Ok(next.run(req).await)
}

pub async fn require_editor(req: Request, next: Next) -> Result<Response, AppError> {
    require(Role::Editor, req, next).await
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    require(Role::Admin, req, next).await
}

/// Extractor for the claims of an authenticated caller.
pub struct AuthUser(pub BearerClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BearerClaims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}
