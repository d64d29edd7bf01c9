//! RBAC Admin API Routes
//!
//! Endpoints for managing roles and user assignments and for asking the
//! evaluator for decisions. Reads require `read`; mutations require the
//! configured admin permission.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::app::AppState;
use crate::authz::{permissions, PolicyEvaluator};
use crate::errors::{AppError, AppResult, RbacResult};
use crate::identity::Caller;
use crate::models::decision::{AuthorizationDecision, AuthorizeRequest, Combine};
use crate::models::role::{RoleCreateRequest, RoleDefinition, RoleView};
use crate::models::user::{SetDisabledRequest, UserCreateRequest, UserView};
use crate::report::{self, PermissionMatrix};

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        // Roles
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:name", get(get_role).put(update_role))
        // Users
        .route("/users", get(list_users).post(create_user))
        .route("/users/:username", get(get_user))
        .route(
            "/users/:username/roles/:role",
            put(assign_role).delete(revoke_role),
        )
        .route("/users/:username/disabled", put(set_disabled))
        .route(
            "/users/:username/effective-permissions",
            get(get_effective_permissions),
        )
        // Decisions
        .route("/authorize", post(authorize))
        .route("/matrix", get(get_matrix))
}

fn role_view(state: &AppState, name: &str) -> RbacResult<RoleView> {
    let registry = state.evaluator.registry();
    let role = registry.get_role(name)?;
    let effective = registry.effective_permissions(name)?;
    Ok(RoleView::new(role, effective))
}

fn user_view(state: &AppState, username: &str) -> RbacResult<UserView> {
    let user = state.evaluator.directory().get_user(username)?;
    let effective = state.evaluator.effective_permissions_for_user(username)?;
    Ok(UserView::new(user, effective))
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

/// List all roles with their effective permissions
#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses(
        (status = 200, description = "List of roles", body = Vec<RoleView>),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Vec<RoleView>>> {
    caller.require(&state, permissions::READ)?;

    let registry = state.evaluator.registry();
    let views = registry
        .roles()
        .into_iter()
        .map(|role| -> RbacResult<RoleView> {
            let effective = registry.effective_permissions(&role.name)?;
            Ok(RoleView::new(role, effective))
        })
        .collect::<RbacResult<Vec<_>>>()?;

    Ok(Json(views))
}

/// Create a new role
#[utoipa::path(
    post,
    path = "/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleView),
        (status = 400, description = "Unknown parent or inheritance cycle"),
        (status = 409, description = "Role name already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<RoleView>)> {
    caller.require(&state, &state.admin_permission)?;

    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("role name must not be empty"));
    }

    state
        .evaluator
        .registry()
        .add_role(&req.name, req.permissions, &req.parents)?;
    tracing::info!(actor = %caller.username, role = %req.name, "role created via api");

    Ok((StatusCode::CREATED, Json(role_view(&state, &req.name)?)))
}

/// Get a role by name
#[utoipa::path(
    get,
    path = "/rbac/roles/{name}",
    tag = "RBAC",
    params(
        ("name" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Role details", body = RoleView),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
) -> AppResult<Json<RoleView>> {
    caller.require(&state, permissions::READ)?;
    Ok(Json(role_view(&state, &name)?))
}

/// Replace a role's permissions and parents
#[utoipa::path(
    put,
    path = "/rbac/roles/{name}",
    tag = "RBAC",
    params(
        ("name" = String, Path, description = "Role name"),
    ),
    request_body = RoleDefinition,
    responses(
        (status = 200, description = "Role updated", body = RoleView),
        (status = 400, description = "Unknown parent or inheritance cycle"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
    Json(req): Json<RoleDefinition>,
) -> AppResult<Json<RoleView>> {
    caller.require(&state, &state.admin_permission)?;

    state
        .evaluator
        .registry()
        .update_role(&name, req.permissions, &req.parents)?;
    tracing::info!(actor = %caller.username, role = %name, "role updated via api");

    Ok(Json(role_view(&state, &name)?))
}

// =============================================================================
// USER ENDPOINTS
// =============================================================================

/// List all users
#[utoipa::path(
    get,
    path = "/rbac/users",
    tag = "RBAC",
    responses(
        (status = 200, description = "List of users", body = Vec<UserView>),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Vec<UserView>>> {
    caller.require(&state, permissions::READ)?;

    let views = state
        .evaluator
        .directory()
        .users()
        .into_iter()
        .map(|user| -> RbacResult<UserView> {
            let effective = state.evaluator.effective_permissions_for_user(&user.username)?;
            Ok(UserView::new(user, effective))
        })
        .collect::<RbacResult<Vec<_>>>()?;

    Ok(Json(views))
}

/// Create a user with an initial set of roles
#[utoipa::path(
    post,
    path = "/rbac/users",
    tag = "RBAC",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 404, description = "Unknown role"),
        (status = 409, description = "Username already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    caller.require(&state, &state.admin_permission)?;

    if req.username.trim().is_empty() {
        return Err(AppError::bad_request("username must not be empty"));
    }

    state
        .evaluator
        .directory()
        .add_user(&req.username, &req.roles, req.disabled)?;
    tracing::info!(actor = %caller.username, username = %req.username, "user created via api");

    Ok((StatusCode::CREATED, Json(user_view(&state, &req.username)?)))
}

/// Get a user by username
#[utoipa::path(
    get,
    path = "/rbac/users/{username}",
    tag = "RBAC",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    responses(
        (status = 200, description = "User details", body = UserView),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
) -> AppResult<Json<UserView>> {
    caller.require(&state, permissions::READ)?;
    Ok(Json(user_view(&state, &username)?))
}

/// Assign a role to a user (no-op if already held)
#[utoipa::path(
    put,
    path = "/rbac/users/{username}/roles/{role}",
    tag = "RBAC",
    params(
        ("username" = String, Path, description = "Username"),
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 204, description = "Role assigned"),
        (status = 404, description = "User or role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    caller: Caller,
    Path((username, role)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    caller.require(&state, &state.admin_permission)?;

    state.evaluator.directory().assign_role(&username, &role)?;
    tracing::info!(actor = %caller.username, username = %username, role = %role, "role assigned via api");

    Ok(StatusCode::NO_CONTENT)
}

/// Revoke a role from a user (no-op if not held)
#[utoipa::path(
    delete,
    path = "/rbac/users/{username}/roles/{role}",
    tag = "RBAC",
    params(
        ("username" = String, Path, description = "Username"),
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 204, description = "Role revoked"),
        (status = 404, description = "User or role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    caller: Caller,
    Path((username, role)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    caller.require(&state, &state.admin_permission)?;

    state.evaluator.directory().revoke_role(&username, &role)?;
    tracing::info!(actor = %caller.username, username = %username, role = %role, "role revoked via api");

    Ok(StatusCode::NO_CONTENT)
}

/// Enable or disable a user
#[utoipa::path(
    put,
    path = "/rbac/users/{username}/disabled",
    tag = "RBAC",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    request_body = SetDisabledRequest,
    responses(
        (status = 200, description = "User updated", body = UserView),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_disabled(
    State(state): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
    Json(req): Json<SetDisabledRequest>,
) -> AppResult<Json<UserView>> {
    caller.require(&state, &state.admin_permission)?;

    state.evaluator.directory().set_disabled(&username, req.disabled)?;
    tracing::info!(
        actor = %caller.username,
        username = %username,
        disabled = req.disabled,
        "user disabled flag set via api"
    );

    Ok(Json(user_view(&state, &username)?))
}

/// Flattened permissions granted by the user's roles
#[utoipa::path(
    get,
    path = "/rbac/users/{username}/effective-permissions",
    tag = "RBAC",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    responses(
        (status = 200, description = "Effective permissions", body = Vec<String>),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    caller.require(&state, permissions::READ)?;

    let effective = state.evaluator.effective_permissions_for_user(&username)?;
    Ok(Json(effective.into_iter().collect()))
}

// =============================================================================
// DECISIONS
// =============================================================================

/// Evaluate a permission request for any user
///
/// Denials are returned as 200 with `allowed: false`; an unknown user is 404.
/// One permission without a `mode` is a single check; an explicit `mode`
/// is always echoed back in the decision.
#[utoipa::path(
    post,
    path = "/rbac/authorize",
    tag = "RBAC",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Authorization decision", body = AuthorizationDecision),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn authorize(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<AuthorizeRequest>,
) -> AppResult<Json<AuthorizationDecision>> {
    caller.require(&state, permissions::READ)?;

    let requested: Vec<&str> = req.permissions.iter().map(String::as_str).collect();
    let decision = match (req.mode, requested.as_slice()) {
        (None, [single]) => state.evaluator.authorize(&req.username, single)?,
        (Some(Combine::Any), many) => state.evaluator.authorize_any(&req.username, many)?,
        (_, many) => state.evaluator.authorize_all(&req.username, many)?,
    };

    Ok(Json(decision))
}

/// Users × permissions decision matrix
#[utoipa::path(
    get,
    path = "/rbac/matrix",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permission matrix", body = PermissionMatrix),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_matrix(State(state): State<AppState>, caller: Caller) -> AppResult<Json<PermissionMatrix>> {
    caller.require(&state, permissions::READ)?;
    Ok(Json(report::permission_matrix(&state.evaluator)?))
}
