use anyhow::Context;
use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use rbac_engine::authz::AuthzMode;
use rbac_engine::config::{RbacConfig, ServerConfig};
use rbac_engine::{create_app, AppState};

fn app_with_mode(mode: AuthzMode) -> Result<Router> {
    let settings = ServerConfig {
        mode,
        ..ServerConfig::default()
    };
    let state = AppState::from_config(&RbacConfig::demo(), &settings)?;
    Ok(create_app(state))
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", user));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes)
            .with_context(|| format!("non-json body: {}", String::from_utf8_lossy(&body_bytes)))?
    };
    Ok((status, value))
}

#[tokio::test]
async fn health_reports_counts() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;
    let (status, body) = send(&app, "GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], 3);
    assert_eq!(body["users"], 3);
    assert_eq!(body["mode"], "strict");
    Ok(())
}

#[tokio::test]
async fn guarded_content_per_role() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;

    let cases = [
        ("/admin-only", "admin", StatusCode::OK),
        ("/admin-only", "editor", StatusCode::FORBIDDEN),
        ("/admin-only", "viewer", StatusCode::FORBIDDEN),
        ("/editor-content", "admin", StatusCode::OK),
        ("/editor-content", "editor", StatusCode::OK),
        ("/editor-content", "viewer", StatusCode::FORBIDDEN),
        ("/public-content", "admin", StatusCode::OK),
        ("/public-content", "editor", StatusCode::OK),
        ("/public-content", "viewer", StatusCode::OK),
    ];

    for (uri, user, expected) in cases {
        let (status, body) = send(&app, "GET", uri, Some(user), None).await?;
        assert_eq!(status, expected, "{user} on {uri}: {body}");
    }

    let (_, body) = send(&app, "GET", "/editor-content", Some("editor"), None).await?;
    assert_eq!(body["matched_roles"], json!(["editor"]));

    let (_, body) = send(&app, "GET", "/admin-only", Some("viewer"), None).await?;
    assert_eq!(body["error"], "forbidden");
    assert!(body["message"].as_str().unwrap_or_default().contains("permission_not_granted"));
    Ok(())
}

#[tokio::test]
async fn missing_or_unknown_credentials_are_unauthorized() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;

    let (status, _) = send(&app, "GET", "/public-content", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/public-content", Some("ghost"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/me", Some("ghost"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn me_lists_effective_permissions() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;
    let (status, body) = send(&app, "GET", "/me", Some("editor"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "editor");
    assert_eq!(body["effective_permissions"], json!(["read", "update"]));
    Ok(())
}

#[tokio::test]
async fn admin_manages_roles_and_users() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;

    // non-admin cannot mutate
    let (status, _) = send(
        &app,
        "POST",
        "/rbac/roles",
        Some("editor"),
        Some(json!({ "name": "publisher", "permissions": ["publish"], "parents": ["editor"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/rbac/roles",
        Some("admin"),
        Some(json!({ "name": "publisher", "permissions": ["publish"], "parents": ["editor"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["effective_permissions"], json!(["publish", "read", "update"]));

    let (status, body) = send(
        &app,
        "POST",
        "/rbac/roles",
        Some("admin"),
        Some(json!({ "name": "publisher" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_role");

    // misspelled keys are rejected rather than ignored
    let (status, _) = send(
        &app,
        "POST",
        "/rbac/users",
        Some("admin"),
        Some(json!({ "username": "typo", "roles": ["viewer"], "disabld": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        "/rbac/roles",
        Some("admin"),
        Some(json!({ "name": "orphan", "parents": ["nobody"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // closing a cycle through an update is rejected
    let (status, _) = send(
        &app,
        "PUT",
        "/rbac/roles/editor",
        Some("admin"),
        Some(json!({ "permissions": ["read", "update"], "parents": ["publisher"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/rbac/users",
        Some("admin"),
        Some(json!({ "username": "pat", "roles": ["viewer"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, _) = send(&app, "PUT", "/rbac/users/pat/roles/publisher", Some("admin"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // second assignment is a no-op
    let (status, _) = send(&app, "PUT", "/rbac/users/pat/roles/publisher", Some("admin"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", "/rbac/users/pat", Some("viewer"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["viewer", "publisher"]));

    let (status, _) = send(&app, "PUT", "/rbac/users/pat/roles/auditor", Some("admin"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/rbac/users/pat/roles/admin", Some("admin"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        "GET",
        "/rbac/users/pat/effective-permissions",
        Some("viewer"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["publish", "read", "update"]));
    Ok(())
}

#[tokio::test]
async fn disabling_a_user_blocks_access() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;

    let (status, body) = send(
        &app,
        "PUT",
        "/rbac/users/viewer/disabled",
        Some("admin"),
        Some(json!({ "disabled": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disabled"], true);

    let (status, body) = send(&app, "GET", "/public-content", Some("viewer"), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap_or_default().contains("user_disabled"));
    Ok(())
}

#[tokio::test]
async fn authorize_endpoint_returns_decisions() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;

    let (status, body) = send(
        &app,
        "POST",
        "/rbac/authorize",
        Some("viewer"),
        Some(json!({ "username": "editor", "permissions": ["read", "update"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert_eq!(body["mode"], "all");

    let (_, body) = send(
        &app,
        "POST",
        "/rbac/authorize",
        Some("viewer"),
        Some(json!({ "username": "viewer", "permissions": ["read", "update"], "mode": "all" })),
    )
    .await?;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "permission_not_granted");
    assert_eq!(body["denied_permission"], "update");

    let (_, body) = send(
        &app,
        "POST",
        "/rbac/authorize",
        Some("viewer"),
        Some(json!({ "username": "viewer", "permissions": ["update", "read"], "mode": "any" })),
    )
    .await?;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["grants"][0]["permission"], "read");

    let (_, body) = send(
        &app,
        "POST",
        "/rbac/authorize",
        Some("viewer"),
        Some(json!({ "username": "viewer", "permissions": ["read"] })),
    )
    .await?;
    assert_eq!(body["mode"], "single");

    let (_, body) = send(
        &app,
        "POST",
        "/rbac/authorize",
        Some("viewer"),
        Some(json!({ "username": "viewer", "permissions": ["read"], "mode": "any" })),
    )
    .await?;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["mode"], "any");

    let (status, body) = send(
        &app,
        "POST",
        "/rbac/authorize",
        Some("viewer"),
        Some(json!({ "username": "ghost", "permissions": ["read"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_user");
    Ok(())
}

#[tokio::test]
async fn bearer_scheme_is_case_insensitive() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;
    for header in ["bearer admin", "BEARER admin"] {
        let req = Request::builder()
            .uri("/admin-only")
            .header("authorization", header)
            .body(Body::empty())?;
        let resp = app.clone().oneshot(req).await?;
        assert_eq!(resp.status(), StatusCode::OK, "{header}");
    }
    Ok(())
}

#[tokio::test]
async fn matrix_lists_every_user() -> Result<()> {
    let app = app_with_mode(AuthzMode::Strict)?;
    let (status, body) = send(&app, "GET", "/rbac/matrix", Some("viewer"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"], json!(["create", "delete", "read", "update"]));
    assert_eq!(body["rows"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn advisory_mode_lets_denials_through() -> Result<()> {
    let app = app_with_mode(AuthzMode::Advisory)?;

    let (status, body) = send(&app, "GET", "/admin-only", Some("viewer"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched_roles"], json!([]));

    // identity is still required
    let (status, _) = send(&app, "GET", "/admin-only", Some("ghost"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn off_mode_skips_checks() -> Result<()> {
    let app = app_with_mode(AuthzMode::Off)?;
    let (status, _) = send(&app, "GET", "/admin-only", Some("anyone"), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
