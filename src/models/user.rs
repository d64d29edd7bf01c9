use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::{dedup_names, utc_now};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub username: String,
    /// Assigned roles in assignment order. Evaluation walks them in this order.
    pub roles: Vec<String>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new<R>(username: impl Into<String>, roles: R, disabled: bool) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let now = utc_now();
        Self {
            username: username.into(),
            roles: dedup_names(roles),
            disabled,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// User body as it appears in a bootstrap file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserDefinition {
    #[serde(default)]
    #[schema(example = json!(["editor"]))]
    pub roles: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserCreateRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[serde(default)]
    #[schema(example = json!(["editor"]))]
    pub roles: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SetDisabledRequest {
    pub disabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub username: String,
    pub roles: Vec<String>,
    pub disabled: bool,
    pub effective_permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    pub fn new(user: User, effective: BTreeSet<String>) -> Self {
        UserView {
            username: user.username,
            roles: user.roles,
            disabled: user.disabled,
            effective_permissions: effective.into_iter().collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
