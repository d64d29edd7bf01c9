use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{AuthorizationEvaluator, AuthzMode};
use crate::config::{RbacConfig, ServerConfig};
use crate::errors::ConfigError;
use crate::routes::{content, health, rbac};

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<AuthorizationEvaluator>,
    pub mode: AuthzMode,
    pub admin_permission: Arc<str>,
}

impl AppState {
    pub fn new(evaluator: AuthorizationEvaluator, settings: &ServerConfig) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            mode: settings.mode,
            admin_permission: Arc::from(settings.admin_permission.as_str()),
        }
    }

    pub fn from_config(rbac: &RbacConfig, settings: &ServerConfig) -> Result<Self, ConfigError> {
        let evaluator = rbac.build()?;
        Ok(Self::new(evaluator, settings))
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health::health))
        .route("/me", get(content::me))
        .route("/admin-only", get(content::admin_only))
        .route("/editor-content", get(content::editor_content))
        .route("/public-content", get(content::public_content))
        .nest("/rbac", rbac::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
