use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::report;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::content::me,
        routes::content::admin_only,
        routes::content::editor_content,
        routes::content::public_content,
        routes::rbac::list_roles,
        routes::rbac::create_role,
        routes::rbac::get_role,
        routes::rbac::update_role,
        routes::rbac::list_users,
        routes::rbac::create_user,
        routes::rbac::get_user,
        routes::rbac::assign_role,
        routes::rbac::revoke_role,
        routes::rbac::set_disabled,
        routes::rbac::get_effective_permissions,
        routes::rbac::authorize,
        routes::rbac::get_matrix
    ),
    components(
        schemas(
            models::role::RoleView,
            models::role::RoleDefinition,
            models::role::RoleCreateRequest,
            models::user::UserView,
            models::user::UserCreateRequest,
            models::user::SetDisabledRequest,
            models::decision::AuthorizationDecision,
            models::decision::AuthorizeRequest,
            models::decision::PermissionGrant,
            models::decision::DenialReason,
            models::decision::CheckMode,
            models::decision::Combine,
            report::PermissionMatrix,
            report::MatrixRow,
            routes::content::ContentResponse,
            routes::health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Content", description = "Demo resources guarded by one permission each"),
        (name = "RBAC", description = "Role and user administration, authorization decisions")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("username")
                        .build(),
                ),
            );
        }
    }
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
    doc
}

/// Swagger UI at `/docs`, document at `/api-docs/openapi.json`.
pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", doc))
}
