use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::utc_now;

/// Why a check came back denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    UserDisabled,
    PermissionNotGranted,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::UserDisabled => "user_disabled",
            DenialReason::PermissionNotGranted => "permission_not_granted",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the requested permissions were combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    #[default]
    Single,
    All,
    Any,
}

/// Audit record for one permission that was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionGrant {
    pub permission: String,
    /// Assigned role that matched first, in assignment order.
    pub role: String,
    /// Roles in that role's inheritance closure owning the permission directly.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationDecision {
    pub username: String,
    pub requested: Vec<String>,
    pub mode: CheckMode,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// First permission that failed an `all` check, or the single permission denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_permission: Option<String>,
    #[serde(default)]
    pub grants: Vec<PermissionGrant>,
    pub evaluated_at: DateTime<Utc>,
}

impl AuthorizationDecision {
    pub fn allow(
        username: impl Into<String>,
        requested: Vec<String>,
        mode: CheckMode,
        grants: Vec<PermissionGrant>,
    ) -> Self {
        Self {
            username: username.into(),
            requested,
            mode,
            allowed: true,
            reason: None,
            denied_permission: None,
            grants,
            evaluated_at: utc_now(),
        }
    }

    pub fn deny(
        username: impl Into<String>,
        requested: Vec<String>,
        mode: CheckMode,
        reason: DenialReason,
        denied_permission: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            requested,
            mode,
            allowed: false,
            reason: Some(reason),
            denied_permission,
            grants: Vec::new(),
            evaluated_at: utc_now(),
        }
    }

    /// Assigned roles that contributed a grant, without repeats.
    pub fn matching_roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = Vec::new();
        for grant in &self.grants {
            if !roles.contains(&grant.role.as_str()) {
                roles.push(grant.role.as_str());
            }
        }
        roles
    }
}

/// Body of `POST /rbac/authorize`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    #[schema(example = "editor")]
    pub username: String,
    #[schema(example = json!(["read", "update"]))]
    pub permissions: Vec<String>,
    /// Omitted: a single check for one permission, `all` otherwise.
    #[serde(default)]
    pub mode: Option<Combine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Combine {
    All,
    Any,
}
