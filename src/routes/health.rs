use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::AuthzMode;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub roles: usize,
    pub users: usize,
    /// Enforcement mode: off, advisory or strict.
    pub mode: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let mode = match state.mode {
        AuthzMode::Off => "off",
        AuthzMode::Advisory => "advisory",
        AuthzMode::Strict => "strict",
    };

    Ok(Json(HealthResponse {
        status: "ok",
        roles: state.evaluator.registry().len(),
        users: state.evaluator.directory().len(),
        mode,
    }))
}
