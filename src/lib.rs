pub mod app;
pub mod authz;
pub mod config;
pub mod docs;
pub mod errors;
pub mod identity;
pub mod models;
pub mod report;
pub mod routes;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_app, AppState};
pub use authz::{AuthorizationEvaluator, PolicyEvaluator, RoleRegistry, UserDirectory};
pub use config::RbacConfig;
pub use errors::{RbacError, RbacResult};
