use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    Extension, Form,
};
use serde::Deserialize;
use service_core::authz::{AuthorizationContext, Principal, Role};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::PrincipalRoles;
use crate::services::{GrantOutcome, RevokeOutcome};
use crate::AppState;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub email: String,
    pub roles: String,
    pub is_admin: bool,
}

#[derive(Template)]
#[template(path = "users.html")]
pub struct UsersTemplate {
    pub email: String,
    pub principals: Vec<PrincipalRoles>,
    pub notice: Option<String>,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RoleAction {
    Grant,
    Revoke,
}

#[derive(Deserialize)]
pub struct RoleForm {
    pub role: Role,
    pub action: RoleAction,
}

#[derive(Deserialize, Default)]
pub struct UsersQuery {
    #[serde(default)]
    pub outcome: Option<String>,
}

fn outcome_message(code: &str) -> Option<&'static str> {
    match code {
        "granted" => Some("Role granted."),
        "role_exists" => Some("User already has this role."),
        "revoked" => Some("Role revoked."),
        "not_assigned" => Some("User does not have this role."),
        _ => None,
    }
}

fn role_names(principal: &Principal) -> String {
    principal
        .roles()
        .iter()
        .map(Role::as_hosted_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn dashboard(
    Extension(ctx): Extension<AuthorizationContext>,
    Extension(principal): Extension<Principal>,
) -> impl IntoResponse {
    DashboardTemplate {
        email: principal.email().to_string(),
        roles: role_names(&principal),
        is_admin: ctx.is_admin(),
    }
}

pub async fn users_page(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthorizationContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<UsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let principals = state.roles.list_principals(&ctx).await?;

    Ok(UsersTemplate {
        email: principal.email().to_string(),
        principals,
        notice: query
            .outcome
            .as_deref()
            .and_then(outcome_message)
            .map(str::to_string),
    })
}

pub async fn manage_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthorizationContext>,
    Path(user_id): Path<Uuid>,
    Form(form): Form<RoleForm>,
) -> Result<Redirect, AppError> {
    let outcome = match form.action {
        RoleAction::Grant => match state.roles.grant_role(&ctx, user_id, form.role).await? {
            GrantOutcome::Granted => "granted",
            GrantOutcome::RoleExists => "role_exists",
        },
        RoleAction::Revoke => match state.roles.revoke_role(&ctx, user_id, form.role).await? {
            RevokeOutcome::Revoked => "revoked",
            RevokeOutcome::NotAssigned => "not_assigned",
        },
    };

    Ok(Redirect::to(&format!("/admin/users?outcome={}", outcome)))
}
