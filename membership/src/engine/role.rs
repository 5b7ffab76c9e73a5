use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::permissions::Permissions;

/// Role identifier. The default (@everyone) role shares its guild's id.
pub type RoleId = String;

/// A role as owned by a guild's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// RGB color, 0 means "no color".
    #[serde(default)]
    pub color: u32,
    /// Whether members with this role are listed separately.
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub mentionable: bool,
    /// Managed by an integration; cannot be assigned by hand.
    #[serde(default)]
    pub managed: bool,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>, position: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: 0,
            hoist: false,
            position,
            permissions: Permissions::empty(),
            mentionable: false,
            managed: false,
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn hoisted(mut self) -> Self {
        self.hoist = true;
        self
    }

    /// True if this role ranks above `other` in the guild hierarchy.
    /// Ties on position go to the lower id.
    pub fn outranks(&self, other: &Role) -> bool {
        match self.position.cmp(&other.position) {
            std::cmp::Ordering::Equal => self.id < other.id,
            ord => ord.is_gt(),
        }
    }
}

/// Anything that can name a role: a bare id or a role object.
pub trait AsRoleId {
    fn as_role_id(&self) -> &str;
}

impl AsRoleId for str {
    fn as_role_id(&self) -> &str {
        self
    }
}

impl AsRoleId for String {
    fn as_role_id(&self) -> &str {
        self
    }
}

impl AsRoleId for Role {
    fn as_role_id(&self) -> &str {
        &self.id
    }
}

impl<T: AsRoleId + ?Sized> AsRoleId for &T {
    fn as_role_id(&self) -> &str {
        (**self).as_role_id()
    }
}

/// Guild-owned role table. Mutated by platform events, read by members at
/// lookup time; lookups hand out clones so no map guard escapes.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: DashMap<RoleId, Role>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a role. Returns the previous value, if any.
    pub fn insert(&self, role: Role) -> Option<Role> {
        self.roles.insert(role.id.clone(), role)
    }

    pub fn remove(&self, id: &str) -> Option<Role> {
        self.roles.remove(id).map(|(_, role)| role)
    }

    pub fn get(&self, id: &str) -> Option<Role> {
        self.roles.get(id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.roles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_insert_get_remove() {
        let registry = RoleRegistry::new();
        assert!(registry.is_empty());

        registry.insert(Role::new("R1", "Mods", 1));
        assert!(registry.contains("R1"));
        assert_eq!(registry.get("R1").unwrap().name, "Mods");

        let previous = registry.insert(Role::new("R1", "Moderators", 1));
        assert_eq!(previous.unwrap().name, "Mods");
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("R1").is_some());
        assert!(registry.get("R1").is_none());
        assert!(registry.remove("R1").is_none());
    }

    #[test]
    fn test_role_id_from_object_and_str() {
        let role = Role::new("R7", "Seven", 0);
        let owned = String::from("R8");
        assert_eq!(role.as_role_id(), "R7");
        assert_eq!((&role).as_role_id(), "R7");
        assert_eq!("R9".as_role_id(), "R9");
        assert_eq!(owned.as_role_id(), "R8");
    }

    #[test]
    fn test_outranks_by_position_then_id() {
        let low = Role::new("100", "low", 1);
        let high = Role::new("200", "high", 5);
        assert!(high.outranks(&low));
        assert!(!low.outranks(&high));

        let a = Role::new("100", "a", 3);
        let b = Role::new("200", "b", 3);
        assert!(a.outranks(&b));
        assert!(!b.outranks(&a));
        assert!(!a.outranks(&a));
    }

    #[test]
    fn test_role_deserializes_with_defaults() {
        let role: Role = serde_json::from_str(r#"{"id":"R1","name":"Mods"}"#).unwrap();
        assert_eq!(role.position, 0);
        assert_eq!(role.color, 0);
        assert!(role.permissions.is_empty());
        assert!(!role.hoist);
    }
}
