use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::authz::{permissions, roles, AuthorizationEvaluator, AuthzMode, RoleRegistry, UserDirectory};
use crate::errors::{AppError, ConfigError, RbacError, RbacResult};
use crate::models::role::RoleDefinition;
use crate::models::user::UserDefinition;

const DEFAULT_PORT: u16 = 8000;

/// Role and user definitions supplied at bootstrap.
///
/// ```json
/// { "roles": { "editor": { "permissions": ["read", "update"], "parents": [] } },
///   "users": { "e": { "roles": ["editor"], "disabled": false } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RbacConfig {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleDefinition>,
    #[serde(default)]
    pub users: BTreeMap<String, UserDefinition>,
}

impl RbacConfig {
    /// Three flat roles and one user per role.
    pub fn demo() -> Self {
        let role = |perms: &[&str]| RoleDefinition {
            permissions: perms.iter().map(|p| p.to_string()).collect(),
            parents: Vec::new(),
        };
        let user = |role: &str| UserDefinition {
            roles: vec![role.to_string()],
            disabled: false,
        };

        let mut config = RbacConfig::default();
        config.roles.insert(
            roles::ADMIN.to_string(),
            role(&[
                permissions::CREATE,
                permissions::READ,
                permissions::UPDATE,
                permissions::DELETE,
            ]),
        );
        config.roles.insert(
            roles::EDITOR.to_string(),
            role(&[permissions::READ, permissions::UPDATE]),
        );
        config
            .roles
            .insert(roles::VIEWER.to_string(), role(&[permissions::READ]));

        for name in [roles::ADMIN, roles::EDITOR, roles::VIEWER] {
            config.users.insert(name.to_string(), user(name));
        }
        config
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses JSON, reporting the path of the offending value on failure.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let de = &mut serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(de).map_err(|err| format!("{}: {}", err.path(), err.inner()))
    }

    /// Registers every role after its parents, whatever order the file lists them in.
    pub fn build_registry(&self) -> RbacResult<RoleRegistry> {
        let registry = RoleRegistry::new();
        let mut pending: Vec<(&String, &RoleDefinition)> = self.roles.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();

            for (name, def) in pending {
                if def.parents.iter().all(|parent| registry.has_role(parent)) {
                    registry.add_role(name, def.permissions.iter().cloned(), &def.parents)?;
                } else {
                    blocked.push((name, def));
                }
            }

            if blocked.len() == before {
                return Err(self.explain_blocked(&blocked, &registry));
            }
            pending = blocked;
        }

        Ok(registry)
    }

    /// Builds the registry, then the directory validated against it.
    pub fn build(&self) -> RbacResult<AuthorizationEvaluator> {
        let registry = Arc::new(self.build_registry()?);
        let directory = Arc::new(UserDirectory::new(Arc::clone(&registry)));

        for (username, def) in &self.users {
            directory.add_user(username, &def.roles, def.disabled)?;
        }

        tracing::info!(
            roles = registry.len(),
            users = directory.len(),
            "rbac configuration loaded"
        );
        Ok(AuthorizationEvaluator::new(directory))
    }

    // Every blocked role waits on another unregistered role. Either one of
    // those names is missing from the file, or following the waits loops.
    fn explain_blocked(&self, blocked: &[(&String, &RoleDefinition)], registry: &RoleRegistry) -> RbacError {
        for (name, def) in blocked {
            if let Some(parent) = def.parents.iter().find(|p| !self.roles.contains_key(*p)) {
                return RbacError::UnknownParent {
                    role: name.to_string(),
                    parent: parent.clone(),
                };
            }
        }

        let waiting: HashMap<&str, &str> = blocked
            .iter()
            .filter_map(|(name, def)| {
                def.parents
                    .iter()
                    .find(|p| !registry.has_role(p))
                    .map(|p| (name.as_str(), p.as_str()))
            })
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = blocked.first().map(|(name, _)| name.as_str()).unwrap_or_default();
        while let Some(next) = waiting.get(current).copied() {
            if !seen.insert(current) {
                return RbacError::CyclicInheritance {
                    role: current.to_string(),
                    parent: next.to_string(),
                };
            }
            current = next;
        }

        RbacError::CyclicInheritance {
            role: current.to_string(),
            parent: current.to_string(),
        }
    }
}

/// Process settings for `rbac-server`, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Bootstrap file; demo data when unset.
    pub rbac_config: Option<PathBuf>,
    pub mode: AuthzMode,
    /// Permission required by the RBAC admin mutation endpoints.
    pub admin_permission: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rbac_config: None,
            mode: AuthzMode::Strict,
            admin_permission: permissions::DELETE.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let port = match std::env::var("APP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?,
            Err(_) => defaults.port,
        };

        let rbac_config = std::env::var("RBAC_CONFIG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let mode = std::env::var("AUTHZ_MODE")
            .unwrap_or_default()
            .parse::<AuthzMode>()
            .map_err(AppError::configuration)?;

        let admin_permission = std::env::var("RBAC_ADMIN_PERMISSION")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.admin_permission);

        Ok(Self {
            port,
            rbac_config,
            mode,
            admin_permission,
        })
    }

    pub fn load_rbac(&self) -> Result<RbacConfig, ConfigError> {
        match &self.rbac_config {
            Some(path) => RbacConfig::load(path),
            None => Ok(RbacConfig::demo()),
        }
    }
}
