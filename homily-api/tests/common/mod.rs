//! Shared setup for homily-api integration tests: in-memory stores and a
//! router driven through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use homily_api::{
    build_router,
    config::{
        ApiConfig, JwtConfig, RateLimitConfig, SecurityConfig, StorageBackend, StorageConfig,
        SwaggerConfig, SwaggerMode,
    },
    models::ApiUser,
    services::{JwtService, MemoryStore, UserStore},
    utils::hash_password,
    AppState,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use service_core::authz::Role;
use service_core::config::{Config, Environment};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-with-at-least-32-bytes!!";
pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn test_config() -> ApiConfig {
    ApiConfig {
        common: Config { port: 0 },
        environment: Environment::Dev,
        service_name: "homily-api-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new(TEST_SECRET.to_string()),
            expiry_hours: 24,
        },
        admin_bootstrap: None,
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 10,
            login_window_seconds: 900,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
            trusted_proxies: Vec::new(),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub jwt: JwtService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let jwt = JwtService::new(&config.jwt).expect("jwt service");
        let login_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
            &config.rate_limit.trusted_proxies,
        );
        let ip_limiter = create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
            &config.rate_limit.trusted_proxies,
        );
        let state = AppState::new(
            config,
            jwt.clone(),
            store.clone(),
            store.clone(),
            login_limiter,
            ip_limiter,
        );
        let router = build_router(state).expect("router");
        Self { router, store, jwt }
    }

    pub async fn create_user(&self, email: &str, role: Role) -> ApiUser {
        let hash = hash_password(&Secret::new(TEST_PASSWORD.to_string())).expect("hash");
        let user = ApiUser::new(email, hash, role);
        UserStore::insert(self.store.as_ref(), &user)
            .await
            .expect("insert user");
        user
    }

    pub fn token_for(&self, user: &ApiUser) -> String {
        self.jwt.issue_token(user).expect("token").token
    }

    pub fn token_issued_at(&self, user: &ApiUser, at: DateTime<Utc>) -> String {
        self.jwt.issue_token_at(user, at).expect("token").token
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, body)
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

/// Login from `peer` carrying an `x-forwarded-for` value.
pub fn forwarded_login_request(
    email: &str,
    password: &str,
    peer: &str,
    forwarded_for: &str,
) -> Request<Body> {
    let mut request = login_request(email, password, peer);
    request.headers_mut().insert(
        "x-forwarded-for",
        forwarded_for.parse().expect("header value"),
    );
    request
}

/// Login as if sent over a TCP connection from `peer`.
pub fn login_request(email: &str, password: &str, peer: &str) -> Request<Body> {
    let peer: IpAddr = peer.parse().expect("peer ip");
    Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .extension(ConnectInfo(SocketAddr::new(peer, 40_000)))
        .body(Body::from(
            serde_json::json!({ "email": email, "password": password }).to_string(),
        ))
        .expect("request")
}
