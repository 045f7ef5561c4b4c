mod common;

use axum::http::StatusCode;
use common::TestApp;
use service_core::authz::Role;
use uuid::Uuid;

#[tokio::test]
async fn test_editor_is_denied_the_users_page() {
    let app = TestApp::without_ancillary();
    app.hosted_account("lector@parafia.example", &[Role::Editor]);
    app.sign_in("lector@parafia.example").await;

    let res = app.get("/admin/users").await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.body.contains("admin"));
    assert!(!res.body.contains("Grant"));
}

#[tokio::test]
async fn test_editor_cannot_grant_roles() {
    let app = TestApp::without_ancillary();
    let editor = app.hosted_account("lector@parafia.example", &[Role::Editor]);
    app.sign_in("lector@parafia.example").await;

    let uri = format!("/admin/users/{}/roles", editor.id);
    let res = app
        .post_form(&uri, &[("role", "admin"), ("action", "grant")])
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(app.roles.assignment_count(editor.id), 1);
}

#[tokio::test]
async fn test_admin_lists_principals_including_those_without_roles() {
    let app = TestApp::without_ancillary();
    app.hosted_account("proboszcz@parafia.example", &[Role::Admin]);
    app.hosted_account("lector@parafia.example", &[Role::Editor]);
    app.hosted_account("parishioner@parafia.example", &[]);
    app.sign_in("proboszcz@parafia.example").await;

    let res = app.get("/admin/users").await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("lector@parafia.example"));
    assert!(res.body.contains("parishioner@parafia.example"));
    assert!(res.body.contains("none"));
}

#[tokio::test]
async fn test_duplicate_grant_reports_role_exists() {
    let app = TestApp::without_ancillary();
    app.hosted_account("proboszcz@parafia.example", &[Role::Admin]);
    let target = app.hosted_account("lector@parafia.example", &[]);
    app.sign_in("proboszcz@parafia.example").await;
    let uri = format!("/admin/users/{}/roles", target.id);

    let res = app
        .post_form(&uri, &[("role", "editor"), ("action", "grant")])
        .await;
    assert_eq!(res.location.as_deref(), Some("/admin/users?outcome=granted"));

    let res = app
        .post_form(&uri, &[("role", "editor"), ("action", "grant")])
        .await;
    assert_eq!(
        res.location.as_deref(),
        Some("/admin/users?outcome=role_exists")
    );
    assert_eq!(app.roles.assignment_count(target.id), 1);

    let res = app.get("/admin/users?outcome=role_exists").await;
    assert!(res.body.contains("User already has this role."));
}

#[tokio::test]
async fn test_granted_role_applies_on_next_request() {
    let app = TestApp::without_ancillary();
    app.hosted_account("proboszcz@parafia.example", &[Role::Admin]);
    let target = app.hosted_account("lector@parafia.example", &[]);

    app.sign_in("proboszcz@parafia.example").await;
    let uri = format!("/admin/users/{}/roles", target.id);
    app.post_form(&uri, &[("role", "editor"), ("action", "grant")])
        .await;
    app.post_form("/logout", &[]).await;

    app.sign_in("lector@parafia.example").await;
    let res = app.get("/admin").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_may_revoke_own_admin_role() {
    let app = TestApp::without_ancillary();
    let admin = app.hosted_account("proboszcz@parafia.example", &[Role::Admin]);
    app.sign_in("proboszcz@parafia.example").await;

    let uri = format!("/admin/users/{}/roles", admin.id);
    let res = app
        .post_form(&uri, &[("role", "admin"), ("action", "revoke")])
        .await;
    assert_eq!(res.location.as_deref(), Some("/admin/users?outcome=revoked"));

    // Roles are re-read on every request, so the lockout is immediate.
    let res = app.get("/admin/users").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_revoking_unassigned_role_reports_not_assigned() {
    let app = TestApp::without_ancillary();
    app.hosted_account("proboszcz@parafia.example", &[Role::Admin]);
    let target = app.hosted_account("parishioner@parafia.example", &[]);
    app.sign_in("proboszcz@parafia.example").await;

    let uri = format!("/admin/users/{}/roles", target.id);
    let res = app
        .post_form(&uri, &[("role", "editor"), ("action", "revoke")])
        .await;

    assert_eq!(
        res.location.as_deref(),
        Some("/admin/users?outcome=not_assigned")
    );
}

#[tokio::test]
async fn test_granting_to_unknown_principal_is_not_found() {
    let app = TestApp::without_ancillary();
    app.hosted_account("proboszcz@parafia.example", &[Role::Admin]);
    app.sign_in("proboszcz@parafia.example").await;

    let uri = format!("/admin/users/{}/roles", Uuid::new_v4());
    let res = app
        .post_form(&uri, &[("role", "editor"), ("action", "grant")])
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
