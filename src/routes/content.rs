//! Demo resources guarded by a single permission each.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{permissions, AuthzMode};
use crate::errors::{AppError, AppResult, RbacError};
use crate::identity::Caller;
use crate::models::user::UserView;

#[derive(Debug, Serialize, ToSchema)]
pub struct ContentResponse {
    pub message: String,
    pub username: String,
    /// Assigned roles that granted access; empty when checks are off or advisory.
    pub matched_roles: Vec<String>,
}

fn guarded(state: &AppState, caller: Caller, permission: &str, message: &str) -> AppResult<Json<ContentResponse>> {
    let decision = caller.require(state, permission)?;
    let matched_roles: Vec<String> = decision
        .filter(|decision| decision.allowed)
        .map(|decision| decision.matching_roles().into_iter().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(Json(ContentResponse {
        message: message.to_string(),
        username: caller.username,
        matched_roles,
    }))
}

#[utoipa::path(
    get,
    path = "/admin-only",
    tag = "Content",
    responses(
        (status = 200, description = "Requires the delete permission", body = ContentResponse),
        (status = 401, description = "Unknown or missing credential"),
        (status = 403, description = "Permission not granted or user disabled"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn admin_only(State(state): State<AppState>, caller: Caller) -> AppResult<Json<ContentResponse>> {
    guarded(&state, caller, permissions::DELETE, "This is an admin-only route")
}

#[utoipa::path(
    get,
    path = "/editor-content",
    tag = "Content",
    responses(
        (status = 200, description = "Requires the update permission", body = ContentResponse),
        (status = 401, description = "Unknown or missing credential"),
        (status = 403, description = "Permission not granted or user disabled"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn editor_content(State(state): State<AppState>, caller: Caller) -> AppResult<Json<ContentResponse>> {
    guarded(&state, caller, permissions::UPDATE, "This is editable content")
}

#[utoipa::path(
    get,
    path = "/public-content",
    tag = "Content",
    responses(
        (status = 200, description = "Requires the read permission", body = ContentResponse),
        (status = 401, description = "Unknown or missing credential"),
        (status = 403, description = "Permission not granted or user disabled"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn public_content(State(state): State<AppState>, caller: Caller) -> AppResult<Json<ContentResponse>> {
    guarded(&state, caller, permissions::READ, "This is public content")
}

/// The caller's own record with effective permissions.
#[utoipa::path(
    get,
    path = "/me",
    tag = "Content",
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Unknown or missing credential"),
        (status = 403, description = "User disabled"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, caller: Caller) -> AppResult<Json<UserView>> {
    let unknown = |err: RbacError| match err {
        RbacError::UnknownUser(_) => AppError::unauthorized("Invalid authentication credentials"),
        other => AppError::from(other),
    };

    let user = state.evaluator.directory().get_user(&caller.username).map_err(unknown)?;
    if user.disabled && state.mode == AuthzMode::Strict {
        return Err(AppError::forbidden("user_disabled: inactive user"));
    }

    let effective = state
        .evaluator
        .effective_permissions_for_user(&caller.username)
        .map_err(unknown)?;
    Ok(Json(UserView::new(user, effective)))
}
