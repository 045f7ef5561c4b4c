mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{empty_request, login_request, TestApp, TEST_PASSWORD};
use service_core::authz::Role;

#[tokio::test]
async fn test_login_returns_token_and_user() {
    let app = TestApp::new();
    let user = app.create_user("editor@parafia.example", Role::Editor).await;

    let (status, body) = app
        .send(login_request("Editor@Parafia.example", TEST_PASSWORD, "198.51.100.1"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert_eq!(body["user"]["email"], "editor@parafia.example");
    assert_eq!(body["user"]["role"], "EDITOR");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_failure_is_uniform() {
    let app = TestApp::new();
    app.create_user("editor@parafia.example", Role::Editor).await;

    let (unknown_status, unknown_body) = app
        .send(login_request("ghost@parafia.example", TEST_PASSWORD, "198.51.100.2"))
        .await;
    let (wrong_status, wrong_body) = app
        .send(login_request("editor@parafia.example", "not the password", "198.51.100.2"))
        .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, wrong_body);
    assert_eq!(wrong_body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_rejects_malformed_email() {
    let app = TestApp::new();

    let (status, _) = app
        .send(login_request("not-an-email", TEST_PASSWORD, "198.51.100.3"))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_me_echoes_token_claims() {
    let app = TestApp::new();
    let user = app.create_user("admin@parafia.example", Role::Admin).await;
    let token = app.token_for(&user);

    let (status, body) = app
        .send(empty_request("GET", "/api/auth/me", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert_eq!(body["user"]["role"], "ADMIN");
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, _) = app.send(empty_request("GET", "/api/auth/me", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = TestApp::new();
    let user = app.create_user("editor@parafia.example", Role::Editor).await;
    let token = app.token_issued_at(&user, Utc::now() - Duration::hours(25));

    let (status, body) = app
        .send(empty_request("GET", "/api/auth/me", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let app = TestApp::new();
    let user = app.create_user("editor@parafia.example", Role::Editor).await;

    let mut other = common::test_config();
    other.jwt.secret = secrecy::Secret::new("another-secret-that-is-32-bytes-long".to_string());
    let forged = TestApp::with_config(other).token_for(&user);

    let (status, _) = app
        .send(empty_request("GET", "/api/auth/me", Some(&forged)))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
