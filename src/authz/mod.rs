//! Authorization module - role registry, user directory and policy evaluator
//!
//! This module implements the RBAC decision primitive:
//! - Roles owning permission sets, with acyclic multiple inheritance
//! - Users holding ordered role assignments and a disabled flag
//! - An evaluator returning allow/deny decisions with audit metadata
//! - Configurable enforcement modes for the HTTP layer (off/advisory/strict)

mod directory;
mod evaluator;
mod registry;

pub use directory::UserDirectory;
pub use evaluator::{AuthorizationEvaluator, PolicyEvaluator};
pub use registry::RoleRegistry;

use std::str::FromStr;

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthzMode {
    /// No permission checks (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Enforce 403 on denied requests (production mode)
    #[default]
    Strict,
}

impl FromStr for AuthzMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "off" => Ok(AuthzMode::Off),
            "advisory" => Ok(AuthzMode::Advisory),
            "strict" | "" => Ok(AuthzMode::Strict),
            other => Err(format!("unknown authorization mode: {other}")),
        }
    }
}

/// Role names used by the demo configuration
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const EDITOR: &str = "editor";
    pub const VIEWER: &str = "viewer";
}

/// Permission vocabulary used by the demo configuration
pub mod permissions {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}
