mod common;

use axum::http::StatusCode;
use common::TestApp;
use service_core::authz::Role;

#[tokio::test]
async fn test_dashboard_without_session_redirects_to_login() {
    let app = TestApp::without_ancillary();

    let res = app.get("/admin").await;

    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_sign_in_then_sign_out_round_trip() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[Role::Editor]);

    let res = app.sign_in("lector@parafia.example").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/admin"));

    let res = app.get("/admin").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("lector@parafia.example"));
    assert!(res.body.contains("editor"));

    let res = app.post_form("/logout", &[]).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/login?signed_out=true"));
    assert_eq!(app.identity.signed_out_count(), 1);

    let res = app.get("/admin").await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_sign_out_clears_locally_even_when_provider_is_down() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[Role::Editor]);
    app.sign_in("lector@parafia.example").await;

    app.identity.set_unavailable(true);
    app.post_form("/logout", &[]).await;
    app.identity.set_unavailable(false);

    let res = app.get("/admin").await;
    assert_eq!(res.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_signed_in_without_role_sees_access_denied() {
    let app = TestApp::without_ancillary();
    app.hosted_account("parishioner@parafia.example", &[]);
    app.sign_in("parishioner@parafia.example").await;

    let res = app.get("/admin").await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.body.contains("Access denied"));
    assert!(res.body.contains("parishioner@parafia.example"));
    assert!(res.body.contains(r#"action="/logout""#));
}

#[tokio::test]
async fn test_wrong_password_and_outage_are_reported_differently() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[Role::Editor]);

    let res = app
        .post_form(
            "/login",
            &[("email", "lector@parafia.example"), ("password", "wrong")],
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body.contains("Invalid email or password"));

    app.identity.set_unavailable(true);
    let res = app.sign_in("lector@parafia.example").await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(res.body.contains("Service unavailable, try again later"));
}

#[tokio::test]
async fn test_refused_session_is_purged() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[Role::Editor]);
    app.sign_in("lector@parafia.example").await;

    app.identity.set_reject_sessions(true);
    let res = app.get("/admin").await;
    assert_eq!(res.location.as_deref(), Some("/login"));

    // The provider accepting the token again does not bring the session back.
    app.identity.set_reject_sessions(false);
    let res = app.get("/admin").await;
    assert_eq!(res.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_provider_outage_fails_closed_without_purging() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[Role::Editor]);
    app.sign_in("lector@parafia.example").await;

    app.identity.set_unavailable(true);
    let res = app.get("/admin").await;
    assert_eq!(res.location.as_deref(), Some("/login"));

    app.identity.set_unavailable(false);
    let res = app.get("/admin").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_signs_in_without_elevated_access() {
    let app = TestApp::without_ancillary();

    let res = app
        .post_form(
            "/register",
            &[("email", "new@parafia.example"), ("password", common::TEST_PASSWORD)],
        )
        .await;
    assert_eq!(res.location.as_deref(), Some("/admin"));

    let res = app.get("/admin").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post_form(
            "/register",
            &[("email", "new@parafia.example"), ("password", common::TEST_PASSWORD)],
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body.contains("Email might already be in use"));
}

#[tokio::test]
async fn test_password_reset_response_is_uniform() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[]);

    let known = app
        .post_form("/password-reset", &[("email", "lector@parafia.example")])
        .await;
    let unknown = app
        .post_form("/password-reset", &[("email", "nobody@parafia.example")])
        .await;

    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(known.body, unknown.body);
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::without_ancillary();

    let res = app.get("/health").await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("parish-admin"));
}
