use std::collections::BTreeSet;
use std::sync::Arc;

use crate::errors::RbacResult;
use crate::models::decision::{AuthorizationDecision, CheckMode, DenialReason, PermissionGrant};
use crate::utils::dedup_names;

use super::directory::UserDirectory;
use super::registry::RoleRegistry;

/// Policy evaluator trait for pluggable authorization logic.
///
/// Implementors supply the single-permission check; `all`/`any` checks are
/// composed from it and short-circuit on the first deciding permission.
pub trait PolicyEvaluator: Send + Sync {
    /// `Err(UnknownUser)` for an unknown identity, `Some(reason)` when the
    /// user may not be granted anything at all.
    fn subject_denial(&self, username: &str) -> RbacResult<Option<DenialReason>>;

    fn authorize(&self, username: &str, permission: &str) -> RbacResult<AuthorizationDecision>;

    /// Allowed only if every permission is granted. An empty request is denied.
    fn authorize_all(&self, username: &str, permissions: &[&str]) -> RbacResult<AuthorizationDecision> {
        let requested = dedup_names(permissions.iter().copied());
        if let Some(reason) = self.subject_denial(username)? {
            return Ok(AuthorizationDecision::deny(username, requested, CheckMode::All, reason, None));
        }

        let mut grants = Vec::with_capacity(requested.len());
        for permission in &requested {
            let decision = self.authorize(username, permission)?;
            if !decision.allowed {
                let reason = decision.reason.unwrap_or(DenialReason::PermissionNotGranted);
                return Ok(AuthorizationDecision::deny(
                    username,
                    requested.clone(),
                    CheckMode::All,
                    reason,
                    Some(permission.clone()),
                ));
            }
            grants.extend(decision.grants);
        }

        if grants.is_empty() {
            return Ok(AuthorizationDecision::deny(
                username,
                requested,
                CheckMode::All,
                DenialReason::PermissionNotGranted,
                None,
            ));
        }
        Ok(AuthorizationDecision::allow(username, requested, CheckMode::All, grants))
    }

    /// Allowed as soon as one permission is granted. An empty request is denied.
    fn authorize_any(&self, username: &str, permissions: &[&str]) -> RbacResult<AuthorizationDecision> {
        let requested = dedup_names(permissions.iter().copied());
        if let Some(reason) = self.subject_denial(username)? {
            return Ok(AuthorizationDecision::deny(username, requested, CheckMode::Any, reason, None));
        }

        for permission in &requested {
            let decision = self.authorize(username, permission)?;
            if decision.allowed {
                return Ok(AuthorizationDecision::allow(
                    username,
                    requested.clone(),
                    CheckMode::Any,
                    decision.grants,
                ));
            }
            if decision.reason == Some(DenialReason::UserDisabled) {
                return Ok(AuthorizationDecision::deny(
                    username,
                    requested.clone(),
                    CheckMode::Any,
                    DenialReason::UserDisabled,
                    None,
                ));
            }
        }

        Ok(AuthorizationDecision::deny(
            username,
            requested,
            CheckMode::Any,
            DenialReason::PermissionNotGranted,
            None,
        ))
    }
}

/// Default evaluator over a `UserDirectory` and the `RoleRegistry` it is bound to.
///
/// Nothing is cached: every call resolves roles against the current state
/// of both registries.
///
/// Evaluation order:
/// 1. unknown user -> `UnknownUser` error
/// 2. disabled user -> deny (`UserDisabled`)
/// 3. assigned roles in assignment order, first role whose effective
///    permissions contain the permission -> allow
/// 4. deny (`PermissionNotGranted`)
#[derive(Debug, Clone)]
pub struct AuthorizationEvaluator {
    registry: Arc<RoleRegistry>,
    directory: Arc<UserDirectory>,
}

impl AuthorizationEvaluator {
    /// Evaluates against `directory` and the registry its users were validated against.
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        let registry = Arc::clone(directory.registry());
        Self { registry, directory }
    }

    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Union of the effective permissions of every role assigned to the user.
    ///
    /// Reports configured grants; a disabled user is still denied by `authorize`.
    pub fn effective_permissions_for_user(&self, username: &str) -> RbacResult<BTreeSet<String>> {
        let user = self.directory.get_user(username)?;
        let mut permissions = BTreeSet::new();
        for role in &user.roles {
            permissions.extend(self.registry.effective_permissions(role)?);
        }
        Ok(permissions)
    }
}

impl PolicyEvaluator for AuthorizationEvaluator {
    fn subject_denial(&self, username: &str) -> RbacResult<Option<DenialReason>> {
        let user = self.directory.get_user(username)?;
        Ok(user.disabled.then_some(DenialReason::UserDisabled))
    }

    fn authorize(&self, username: &str, permission: &str) -> RbacResult<AuthorizationDecision> {
        let user = self.directory.get_user(username)?;
        let requested = vec![permission.to_string()];

        if user.disabled {
            tracing::debug!(username = %username, permission = %permission, "user disabled");
            return Ok(AuthorizationDecision::deny(
                username,
                requested,
                CheckMode::Single,
                DenialReason::UserDisabled,
                Some(permission.to_string()),
            ));
        }

        for role in &user.roles {
            let sources = self.registry.permission_sources(role, permission)?;
            if sources.is_empty() {
                continue;
            }

            tracing::debug!(
                username = %username,
                permission = %permission,
                role = %role,
                sources = ?sources,
                "permission granted"
            );
            let grant = PermissionGrant {
                permission: permission.to_string(),
                role: role.clone(),
                sources,
            };
            return Ok(AuthorizationDecision::allow(
                username,
                requested,
                CheckMode::Single,
                vec![grant],
            ));
        }

        tracing::debug!(username = %username, permission = %permission, "permission denied");
        Ok(AuthorizationDecision::deny(
            username,
            requested,
            CheckMode::Single,
            DenialReason::PermissionNotGranted,
            Some(permission.to_string()),
        ))
    }
}
