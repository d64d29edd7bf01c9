use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;

use crate::errors::{RbacError, RbacResult};
use crate::models::role::Role;
use crate::utils::{dedup_names, utc_now};

/// Owns every role definition and the inheritance graph between them.
///
/// The parent graph is kept acyclic: each mutation validates its parents and
/// runs a reachability check under the write lock before committing, so a
/// rejected change leaves the registry exactly as it was.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: RwLock<HashMap<String, Role>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new role.
    ///
    /// Fails with `DuplicateRole` if the name is taken, `UnknownParent` if a
    /// parent is not registered and `CyclicInheritance` if the role would
    /// inherit from itself.
    pub fn add_role<P, R>(&self, name: &str, permissions: P, parents: R) -> RbacResult<Role>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let role = Role::new(name, permissions, parents);

        let mut roles = self.roles.write();
        if roles.contains_key(name) {
            return Err(RbacError::DuplicateRole(name.to_string()));
        }
        check_parents(&roles, name, &role.parents)?;
        roles.insert(role.name.clone(), role.clone());

        tracing::info!(
            role = %role.name,
            permissions = role.permissions.len(),
            parents = ?role.parents,
            "role added"
        );
        Ok(role)
    }

    /// Replaces the permissions and parents of an existing role.
    pub fn update_role<P, R>(&self, name: &str, permissions: P, parents: R) -> RbacResult<Role>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let parents = dedup_names(parents);

        let mut roles = self.roles.write();
        let created_at = roles
            .get(name)
            .map(|existing| existing.created_at)
            .ok_or_else(|| RbacError::UnknownRole(name.to_string()))?;
        check_parents(&roles, name, &parents)?;

        let role = Role {
            name: name.to_string(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            parents,
            created_at,
            updated_at: utc_now(),
        };
        roles.insert(role.name.clone(), role.clone());

        tracing::info!(
            role = %role.name,
            permissions = role.permissions.len(),
            parents = ?role.parents,
            "role updated"
        );
        Ok(role)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.read().contains_key(name)
    }

    pub fn get_role(&self, name: &str) -> RbacResult<Role> {
        self.roles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RbacError::UnknownRole(name.to_string()))
    }

    /// All roles, sorted by name.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.read().values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.read().is_empty()
    }

    /// Union of the role's own permissions and those of all its ancestors.
    pub fn effective_permissions(&self, name: &str) -> RbacResult<BTreeSet<String>> {
        let roles = self.roles.read();
        let lineage = lineage(&roles, name)?;
        Ok(lineage
            .into_iter()
            .flat_map(|role| role.permissions.iter().cloned())
            .collect())
    }

    /// Roles in `name`'s inheritance closure (itself included) that own
    /// `permission` directly, in depth-first declaration order.
    ///
    /// Empty means the permission is not among the role's effective permissions.
    pub fn permission_sources(&self, name: &str, permission: &str) -> RbacResult<Vec<String>> {
        let roles = self.roles.read();
        let lineage = lineage(&roles, name)?;
        Ok(lineage
            .into_iter()
            .filter(|role| role.grants(permission))
            .map(|role| role.name.clone())
            .collect())
    }

    /// Every permission granted by at least one role.
    pub fn permission_vocabulary(&self) -> BTreeSet<String> {
        self.roles
            .read()
            .values()
            .flat_map(|role| role.permissions.iter().cloned())
            .collect()
    }

    /// First name in `names` that is not a registered role.
    pub(crate) fn first_unknown<'a, I>(&self, names: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let roles = self.roles.read();
        names
            .into_iter()
            .find(|name| !roles.contains_key(*name))
            .map(str::to_string)
    }
}

fn check_parents(roles: &HashMap<String, Role>, name: &str, parents: &[String]) -> RbacResult<()> {
    for parent in parents {
        if parent == name {
            return Err(RbacError::CyclicInheritance {
                role: name.to_string(),
                parent: parent.clone(),
            });
        }
        if !roles.contains_key(parent) {
            return Err(RbacError::UnknownParent {
                role: name.to_string(),
                parent: parent.clone(),
            });
        }
    }

    for parent in parents {
        if reaches(roles, parent, name) {
            return Err(RbacError::CyclicInheritance {
                role: name.to_string(),
                parent: parent.clone(),
            });
        }
    }

    Ok(())
}

/// Whether `target` is `from` or one of its ancestors.
fn reaches(roles: &HashMap<String, Role>, from: &str, target: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![from];

    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(role) = roles.get(current) {
            stack.extend(role.parents.iter().map(String::as_str));
        }
    }

    false
}

/// `name` followed by its ancestors, each visited once, depth-first in
/// declaration order.
fn lineage<'a>(roles: &'a HashMap<String, Role>, name: &str) -> RbacResult<Vec<&'a Role>> {
    let start = roles
        .get(name)
        .ok_or_else(|| RbacError::UnknownRole(name.to_string()))?;

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&Role> = vec![start];
    let mut out = Vec::new();

    while let Some(role) = stack.pop() {
        if !visited.insert(role.name.as_str()) {
            continue;
        }
        out.push(role);
        // reversed so the first declared parent is popped first
        for parent in role.parents.iter().rev() {
            if let Some(parent) = roles.get(parent) {
                if !visited.contains(parent.name.as_str()) {
                    stack.push(parent);
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chain_flattens_all_ancestors() {
        let registry = RoleRegistry::new();
        registry.add_role("r3", ["a"], NONE).unwrap();
        registry.add_role("r2", ["b"], ["r3"]).unwrap();
        registry.add_role("r1", ["c"], ["r2"]).unwrap();

        assert_eq!(registry.effective_permissions("r1").unwrap(), set(&["a", "b", "c"]));
        assert_eq!(registry.effective_permissions("r2").unwrap(), set(&["a", "b"]));
        assert_eq!(registry.effective_permissions("r3").unwrap(), set(&["a"]));
    }

    #[test]
    fn diamond_visits_shared_ancestor_once() {
        let registry = RoleRegistry::new();
        registry.add_role("r4", ["base"], NONE).unwrap();
        registry.add_role("r2", ["left"], ["r4"]).unwrap();
        registry.add_role("r3", ["right"], ["r4"]).unwrap();
        registry.add_role("r1", NONE, ["r2", "r3"]).unwrap();

        assert_eq!(
            registry.effective_permissions("r1").unwrap(),
            set(&["base", "left", "right"])
        );
        assert_eq!(registry.permission_sources("r1", "base").unwrap(), vec!["r4"]);
    }

    #[test]
    fn sources_follow_declaration_order() {
        let registry = RoleRegistry::new();
        registry.add_role("a", ["read"], NONE).unwrap();
        registry.add_role("b", ["read"], NONE).unwrap();
        registry.add_role("c", ["read"], ["b", "a"]).unwrap();

        assert_eq!(registry.permission_sources("c", "read").unwrap(), vec!["c", "b", "a"]);
        assert!(registry.permission_sources("c", "write").unwrap().is_empty());
    }

    #[test]
    fn duplicate_role_is_rejected() {
        let registry = RoleRegistry::new();
        registry.add_role("viewer", ["read"], NONE).unwrap();
        let err = registry.add_role("viewer", ["write"], NONE).unwrap_err();
        assert_eq!(err, RbacError::DuplicateRole("viewer".into()));
        assert_eq!(registry.effective_permissions("viewer").unwrap(), set(&["read"]));
    }

    #[test]
    fn unknown_parent_is_rejected_without_partial_state() {
        let registry = RoleRegistry::new();
        let err = registry.add_role("editor", ["update"], ["viewer"]).unwrap_err();
        assert_eq!(
            err,
            RbacError::UnknownParent {
                role: "editor".into(),
                parent: "viewer".into()
            }
        );
        assert!(!registry.has_role("editor"));
        assert!(registry.is_empty());
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let registry = RoleRegistry::new();
        let err = registry.add_role("loop", ["x"], ["loop"]).unwrap_err();
        assert!(matches!(err, RbacError::CyclicInheritance { .. }));
        assert!(!registry.has_role("loop"));
    }

    #[test]
    fn update_that_closes_a_cycle_leaves_registry_unchanged() {
        let registry = RoleRegistry::new();
        registry.add_role("b", ["read"], NONE).unwrap();
        registry.add_role("a", ["write"], ["b"]).unwrap();

        let err = registry.update_role("b", ["read", "extra"], ["a"]).unwrap_err();
        assert_eq!(
            err,
            RbacError::CyclicInheritance {
                role: "b".into(),
                parent: "a".into()
            }
        );

        let b = registry.get_role("b").unwrap();
        assert!(b.parents.is_empty());
        assert_eq!(b.permissions, set(&["read"]));
        assert_eq!(registry.effective_permissions("a").unwrap(), set(&["read", "write"]));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let registry = RoleRegistry::new();
        registry.add_role("c", NONE, NONE).unwrap();
        registry.add_role("b", NONE, ["c"]).unwrap();
        registry.add_role("a", NONE, ["b"]).unwrap();

        assert!(matches!(
            registry.update_role("c", NONE, ["a"]),
            Err(RbacError::CyclicInheritance { .. })
        ));
        assert!(registry.get_role("c").unwrap().parents.is_empty());
    }

    #[test]
    fn update_keeps_creation_time_and_changes_grants() {
        let registry = RoleRegistry::new();
        let original = registry.add_role("viewer", ["read"], NONE).unwrap();
        let updated = registry.update_role("viewer", ["read", "list"], NONE).unwrap();

        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(registry.effective_permissions("viewer").unwrap(), set(&["list", "read"]));
    }

    #[test]
    fn update_unknown_role_fails() {
        let registry = RoleRegistry::new();
        assert_eq!(
            registry.update_role("ghost", ["read"], NONE).unwrap_err(),
            RbacError::UnknownRole("ghost".into())
        );
    }

    #[test]
    fn effective_permissions_of_unknown_role_fails() {
        let registry = RoleRegistry::new();
        assert_eq!(
            registry.effective_permissions("ghost").unwrap_err(),
            RbacError::UnknownRole("ghost".into())
        );
    }

    #[test]
    fn deep_hierarchy_does_not_recurse() {
        let registry = RoleRegistry::new();
        registry.add_role("level0", ["p0"], NONE).unwrap();
        for i in 1..2_000 {
            let parent = format!("level{}", i - 1);
            registry
                .add_role(&format!("level{i}"), [format!("p{i}")], [parent.as_str()])
                .unwrap();
        }

        let effective = registry.effective_permissions("level1999").unwrap();
        assert_eq!(effective.len(), 2_000);
    }

    #[test]
    fn vocabulary_and_listing() {
        let registry = RoleRegistry::new();
        registry.add_role("viewer", ["read"], NONE).unwrap();
        registry.add_role("editor", ["update", "read"], ["viewer"]).unwrap();

        assert_eq!(registry.permission_vocabulary(), set(&["read", "update"]));
        let names: Vec<String> = registry.roles().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["editor", "viewer"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn repeated_parents_are_collapsed() {
        let registry = RoleRegistry::new();
        registry.add_role("viewer", ["read"], NONE).unwrap();
        let role = registry.add_role("editor", ["update"], ["viewer", "viewer"]).unwrap();
        assert_eq!(role.parents, vec!["viewer"]);
    }
}
