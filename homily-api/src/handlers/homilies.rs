use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{dtos::homilies::HomilyRequest, models::Homily, utils::ValidatedJson, AppState};

/// List published homilies, newest first
#[utoipa::path(
    get,
    path = "/api/homilies",
    responses((status = 200, description = "Published homilies", body = [Homily])),
    tag = "Homilies"
)]
pub async fn list_homilies(State(state): State<AppState>) -> Result<Json<Vec<Homily>>, AppError> {
    Ok(Json(state.homily_service.list_published().await?))
}

#[utoipa::path(
    get,
    path = "/api/homilies/{id}",
    params(("id" = Uuid, Path, description = "Homily ID")),
    responses(
        (status = 200, description = "Homily", body = Homily),
        (status = 404, description = "Homily not found", body = ErrorResponse)
    ),
    tag = "Homilies"
)]
pub async fn get_homily(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Homily>, AppError> {
    Ok(Json(state.homily_service.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/homilies",
    request_body = HomilyRequest,
    responses(
        (status = 201, description = "Homily created", body = Homily),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Editor role required", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Homilies",
    security(("bearer_auth" = []))
)]
pub async fn create_homily(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<HomilyRequest>,
) -> Result<(StatusCode, Json<Homily>), AppError> {
    let homily = state.homily_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(homily)))
}

#[utoipa::path(
    put,
    path = "/api/homilies/{id}",
    params(("id" = Uuid, Path, description = "Homily ID")),
    request_body = HomilyRequest,
    responses(
        (status = 200, description = "Homily updated", body = Homily),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Editor role required", body = ErrorResponse),
        (status = 404, description = "Homily not found", body = ErrorResponse)
    ),
    tag = "Homilies",
    security(("bearer_auth" = []))
)]
pub async fn update_homily(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<HomilyRequest>,
) -> Result<Json<Homily>, AppError> {
    Ok(Json(state.homily_service.update(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/api/homilies/{id}",
    params(("id" = Uuid, Path, description = "Homily ID")),
    responses(
        (status = 204, description = "Homily deleted"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Editor role required", body = ErrorResponse),
        (status = 404, description = "Homily not found", body = ErrorResponse)
    ),
    tag = "Homilies",
    security(("bearer_auth" = []))
)]
pub async fn delete_homily(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.homily_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
