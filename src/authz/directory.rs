use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::{RbacError, RbacResult};
use crate::models::user::User;
use crate::utils::utc_now;

use super::registry::RoleRegistry;

/// Owns user records and validates their role assignments against one
/// `RoleRegistry`.
///
/// Lock order is directory then registry; the registry never reaches back.
#[derive(Debug)]
pub struct UserDirectory {
    registry: Arc<RoleRegistry>,
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    pub fn new(registry: Arc<RoleRegistry>) -> Self {
        Self {
            registry,
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Registry that role names are validated against.
    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    pub fn add_user<R>(&self, username: &str, roles: R, disabled: bool) -> RbacResult<User>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let user = User::new(username, roles, disabled);

        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(RbacError::DuplicateUser(username.to_string()));
        }
        if let Some(unknown) = self.registry.first_unknown(user.roles.iter().map(String::as_str)) {
            return Err(RbacError::UnknownRole(unknown));
        }
        users.insert(user.username.clone(), user.clone());

        tracing::info!(
            username = %user.username,
            roles = ?user.roles,
            disabled = user.disabled,
            "user added"
        );
        Ok(user)
    }

    /// Appends `role` to the user's assignments. Assigning a held role is a no-op.
    pub fn assign_role(&self, username: &str, role: &str) -> RbacResult<()> {
        let mut users = self.users.write();
        let user = users
            .get_mut(username)
            .ok_or_else(|| RbacError::UnknownUser(username.to_string()))?;
        if !self.registry.has_role(role) {
            return Err(RbacError::UnknownRole(role.to_string()));
        }

        if user.has_role(role) {
            tracing::debug!(username = %username, role = %role, "role already assigned");
            return Ok(());
        }

        user.roles.push(role.to_string());
        user.updated_at = utc_now();
        tracing::info!(username = %username, role = %role, "role assigned");
        Ok(())
    }

    /// Removes `role` from the user's assignments. Revoking an unheld role is a no-op.
    pub fn revoke_role(&self, username: &str, role: &str) -> RbacResult<()> {
        let mut users = self.users.write();
        let user = users
            .get_mut(username)
            .ok_or_else(|| RbacError::UnknownUser(username.to_string()))?;
        if !self.registry.has_role(role) {
            return Err(RbacError::UnknownRole(role.to_string()));
        }

        let before = user.roles.len();
        user.roles.retain(|held| held != role);
        if user.roles.len() == before {
            tracing::debug!(username = %username, role = %role, "role was not assigned");
            return Ok(());
        }

        user.updated_at = utc_now();
        tracing::info!(username = %username, role = %role, "role revoked");
        Ok(())
    }

    pub fn set_disabled(&self, username: &str, disabled: bool) -> RbacResult<()> {
        let mut users = self.users.write();
        let user = users
            .get_mut(username)
            .ok_or_else(|| RbacError::UnknownUser(username.to_string()))?;

        if user.disabled != disabled {
            user.disabled = disabled;
            user.updated_at = utc_now();
        }
        tracing::info!(username = %username, disabled, "user disabled flag set");
        Ok(())
    }

    pub fn get_user(&self, username: &str) -> RbacResult<User> {
        self.users
            .read()
            .get(username)
            .cloned()
            .ok_or_else(|| RbacError::UnknownUser(username.to_string()))
    }

    pub fn has_user(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    /// All users, sorted by username.
    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}
