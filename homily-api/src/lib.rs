pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{ApiConfig, SwaggerMode};
use crate::services::{AuthService, HomilyService, HomilyStore, JwtService, UserService, UserStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::me,
        handlers::homilies::list_homilies,
        handlers::homilies::get_homily,
        handlers::homilies::create_homily,
        handlers::homilies::update_homily,
        handlers::homilies::delete_homily,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::update_user_role,
        handlers::users::delete_user,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::MeResponse,
            dtos::homilies::HomilyRequest,
            dtos::users::CreateUserRequest,
            dtos::users::UpdateRoleRequest,
            models::Homily,
            models::UserSummary,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Bearer token issuance"),
        (name = "Homilies", description = "Homily podcast catalogue"),
        (name = "Users", description = "API account management"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jwt: JwtService,
    pub users: Arc<dyn UserStore>,
    pub homilies: Arc<dyn HomilyStore>,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub homily_service: HomilyService,
    pub login_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        jwt: JwtService,
        users: Arc<dyn UserStore>,
        homilies: Arc<dyn HomilyStore>,
        login_rate_limiter: IpRateLimiter,
        ip_rate_limiter: IpRateLimiter,
    ) -> Self {
        Self {
            auth_service: AuthService::new(users.clone(), jwt.clone()),
            user_service: UserService::new(users.clone()),
            homily_service: HomilyService::new(homilies.clone()),
            config,
            jwt,
            users,
            homilies,
            login_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Login gets its own, much tighter, per-IP budget.
    let login_route = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let me_route = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::bearer_auth_middleware,
        ));

    // Route layers run bottom-up: bearer validation first, then the role check.
    let editor_routes = Router::new()
        .route("/api/homilies", post(handlers::homilies::create_homily))
        .route(
            "/api/homilies/:id",
            put(handlers::homilies::update_homily).delete(handlers::homilies::delete_homily),
        )
        .route_layer(from_fn(middleware::require_editor))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::bearer_auth_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route("/api/users/:id/role", put(handlers::users::update_user_role))
        .route("/api/users/:id", delete(handlers::users::delete_user))
        .route_layer(from_fn(middleware::require_admin))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::bearer_auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/api/homilies", get(handlers::homilies::list_homilies))
        .route("/api/homilies/:id", get(handlers::homilies::get_homily));

    match state.config.swagger.enabled {
        SwaggerMode::Public => {
            app = app
                .merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
        }
        SwaggerMode::Disabled => {
            app = app.route(
                "/.well-known/openapi.json",
                get(|| async { Json(ApiDoc::openapi()) }),
            );
        }
    }

    let app = app
        .merge(login_route)
        .merge(me_route)
        .merge(editor_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Storage is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.users.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Storage health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "storage": "up"
        }
    })))
}
