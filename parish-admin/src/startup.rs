use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::page_security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::ServerSettings;
use crate::handlers::{admin, app, auth, metrics, podcast};
use crate::middleware::{require_admin_page, require_dashboard_access, require_podcast_access};
use crate::AppState;

pub fn build_router(state: AppState, server: &ServerSettings) -> Router {
    let state = state.with_trusted_proxies(&server.trusted_proxies);
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(server.session_hours)));

    let admin_pages = Router::new()
        .route("/admin/users", get(admin::users_page))
        .route("/admin/users/:id/roles", post(admin::manage_role))
        .route_layer(from_fn(require_admin_page));

    // Route layers run outermost-last: dashboard access is checked before
    // the admin-only check.
    let dashboard_pages = Router::new()
        .route("/admin", get(admin::dashboard))
        .merge(admin_pages)
        .route_layer(from_fn_with_state(state.clone(), require_dashboard_access));

    let podcast_pages = Router::new()
        .route("/podcast", get(podcast::home))
        .route_layer(from_fn_with_state(state.clone(), require_podcast_access));

    Router::new()
        .route("/", get(app::index))
        .route("/health", get(app::health_check))
        .route("/metrics", get(metrics::metrics))
        .route("/login", get(auth::login_page).post(auth::login_handler))
        .route("/register", get(auth::register_page).post(auth::register_handler))
        .route("/password-reset", post(auth::password_reset_handler))
        .route("/logout", post(auth::logout_handler))
        .route("/podcast/login", get(podcast::login_page).post(podcast::login_handler))
        .route("/podcast/logout", post(podcast::logout_handler))
        .merge(dashboard_pages)
        .merge(podcast_pages)
        .layer(session_layer)
        .layer(from_fn(page_security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
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
        .with_state(state)
}
