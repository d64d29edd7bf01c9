//! Read-only views over the current registry and directory state.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

use crate::authz::{AuthorizationEvaluator, PolicyEvaluator, RoleRegistry};
use crate::errors::RbacResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionMatrix {
    /// Column headers: every permission some role grants.
    pub permissions: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MatrixRow {
    pub username: String,
    pub roles: Vec<String>,
    pub disabled: bool,
    /// One decision per column of `permissions`.
    pub allowed: Vec<bool>,
}

/// Users × permission vocabulary, each cell decided by the evaluator.
pub fn permission_matrix(evaluator: &AuthorizationEvaluator) -> RbacResult<PermissionMatrix> {
    let permissions: Vec<String> = evaluator.registry().permission_vocabulary().into_iter().collect();

    let mut rows = Vec::new();
    for user in evaluator.directory().users() {
        let mut allowed = Vec::with_capacity(permissions.len());
        for permission in &permissions {
            allowed.push(evaluator.authorize(&user.username, permission)?.allowed);
        }
        rows.push(MatrixRow {
            username: user.username,
            roles: user.roles,
            disabled: user.disabled,
            allowed,
        });
    }

    Ok(PermissionMatrix { permissions, rows })
}

impl fmt::Display for PermissionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .rows
            .iter()
            .map(|row| row.username.len())
            .chain(std::iter::once("user".len()))
            .max()
            .unwrap_or(4);

        write!(f, "{:<width$}", "user", width = name_width)?;
        for permission in &self.permissions {
            write!(f, "  {permission}")?;
        }
        writeln!(f)?;

        for row in &self.rows {
            write!(f, "{:<width$}", row.username, width = name_width)?;
            for (permission, allowed) in self.permissions.iter().zip(&row.allowed) {
                let mark = if *allowed { "yes" } else { "no" };
                write!(f, "  {:<width$}", mark, width = permission.len())?;
            }
            if row.disabled {
                write!(f, "  (disabled)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStats {
    pub users: usize,
    pub disabled_users: usize,
    pub roles: usize,
    pub permissions: Vec<String>,
}

pub fn system_stats(evaluator: &AuthorizationEvaluator) -> SystemStats {
    let users = evaluator.directory().users();
    SystemStats {
        users: users.len(),
        disabled_users: users.iter().filter(|user| user.disabled).count(),
        roles: evaluator.registry().len(),
        permissions: evaluator.registry().permission_vocabulary().into_iter().collect(),
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionComparison {
    pub left: String,
    pub right: String,
    pub common: Vec<String>,
    pub only_left: Vec<String>,
    pub only_right: Vec<String>,
}

impl PermissionComparison {
    fn new(left: &str, right: &str, a: &BTreeSet<String>, b: &BTreeSet<String>) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            common: a.intersection(b).cloned().collect(),
            only_left: a.difference(b).cloned().collect(),
            only_right: b.difference(a).cloned().collect(),
        }
    }
}

/// Compares the configured effective permissions of two users.
pub fn compare_users(evaluator: &AuthorizationEvaluator, left: &str, right: &str) -> RbacResult<PermissionComparison> {
    let a = evaluator.effective_permissions_for_user(left)?;
    let b = evaluator.effective_permissions_for_user(right)?;
    Ok(PermissionComparison::new(left, right, &a, &b))
}

#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoleContainment {
    pub left_contains_right: bool,
    pub right_contains_left: bool,
    pub equal: bool,
    pub permissions: PermissionComparison,
}

/// Subset relation between the effective permissions of two roles.
pub fn compare_roles(registry: &RoleRegistry, left: &str, right: &str) -> RbacResult<RoleContainment> {
    let a = registry.effective_permissions(left)?;
    let b = registry.effective_permissions(right)?;
    Ok(RoleContainment {
        left_contains_right: a.is_superset(&b),
        right_contains_left: b.is_superset(&a),
        equal: a == b,
        permissions: PermissionComparison::new(left, right, &a, &b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RbacConfig;

    #[test]
    fn matrix_reflects_decisions() {
        let eval = RbacConfig::demo().build().unwrap();
        eval.directory().set_disabled("editor", true).unwrap();

        let matrix = permission_matrix(&eval).unwrap();
        assert_eq!(matrix.permissions, vec!["create", "delete", "read", "update"]);

        let row = |name: &str| matrix.rows.iter().find(|r| r.username == name).unwrap();
        assert_eq!(row("admin").allowed, vec![true, true, true, true]);
        assert_eq!(row("editor").allowed, vec![false, false, false, false]);
        assert_eq!(row("viewer").allowed, vec![false, false, true, false]);

        let rendered = matrix.to_string();
        assert!(rendered.starts_with("user"));
        assert!(rendered.contains("(disabled)"));
    }

    #[test]
    fn stats_count_users_and_vocabulary() {
        let eval = RbacConfig::demo().build().unwrap();
        eval.directory().set_disabled("viewer", true).unwrap();

        let stats = system_stats(&eval);
        assert_eq!(stats.users, 3);
        assert_eq!(stats.disabled_users, 1);
        assert_eq!(stats.roles, 3);
        assert_eq!(stats.permissions.len(), 4);
    }

    #[test]
    fn user_comparison_splits_permissions() {
        let eval = RbacConfig::demo().build().unwrap();
        let cmp = compare_users(&eval, "admin", "editor").unwrap();
        assert_eq!(cmp.common, vec!["read", "update"]);
        assert_eq!(cmp.only_left, vec!["create", "delete"]);
        assert!(cmp.only_right.is_empty());
    }

    #[test]
    fn role_containment() {
        let eval = RbacConfig::demo().build().unwrap();
        let rel = compare_roles(eval.registry(), "editor", "viewer").unwrap();
        assert!(rel.left_contains_right);
        assert!(!rel.right_contains_left);
        assert!(!rel.equal);

        let same = compare_roles(eval.registry(), "viewer", "viewer").unwrap();
        assert!(same.equal);
        assert!(compare_roles(eval.registry(), "viewer", "ghost").is_err());
    }
}
