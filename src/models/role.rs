use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::{dedup_names, utc_now};

// =============================================================================
// ROLE
// =============================================================================

/// A named bundle of permissions, optionally inheriting from parent roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub name: String,
    /// Permissions owned directly by this role.
    #[schema(value_type = Vec<String>)]
    pub permissions: BTreeSet<String>,
    /// Parent roles in declaration order.
    pub parents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new<P, R>(name: impl Into<String>, permissions: P, parents: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let now = utc_now();
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            parents: dedup_names(parents),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the role owns `permission` itself, ignoring inheritance.
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Role body as it appears in a bootstrap file or an update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RoleDefinition {
    #[serde(default)]
    #[schema(example = json!(["read", "update"]))]
    pub permissions: Vec<String>,
    #[serde(default)]
    #[schema(example = json!(["viewer"]))]
    pub parents: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RoleCreateRequest {
    #[schema(example = "editor")]
    pub name: String,
    #[serde(default)]
    #[schema(example = json!(["read", "update"]))]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// A role together with its flattened permission set.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleView {
    pub name: String,
    pub permissions: Vec<String>,
    pub parents: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleView {
    pub fn new(role: Role, effective: BTreeSet<String>) -> Self {
        RoleView {
            name: role.name,
            permissions: role.permissions.into_iter().collect(),
            parents: role.parents,
            effective_permissions: effective.into_iter().collect(),
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}
