use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Roles are opaque strings on the wire; [`permissions_for_roles`] maps the
/// known ones to capability sets. Unknown roles grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const STORE_MANAGER: Role = Role(Cow::Borrowed("store-manager"));
    pub const REGIONAL_HEAD: Role = Role(Cow::Borrowed("regional-head"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn permissions(&self) -> Vec<Permission> {
        match self.as_str() {
            "store-manager" => vec![
                Permission::INVENTORY_READ,
                Permission::INVENTORY_WRITE,
                Permission::TRANSFERS_CREATE,
                Permission::REPORTS_READ,
                Permission::ANOMALIES_MANAGE,
            ],
            "regional-head" => vec![
                Permission::INVENTORY_READ,
                Permission::TRANSFERS_APPROVE,
                Permission::REPORTS_READ,
                Permission::ANALYTICS_READ,
                Permission::ANOMALIES_MANAGE,
                Permission::USERS_MANAGE,
            ],
            "admin" => vec![Permission::WILDCARD],
            _ => Vec::new(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Union of the capabilities granted by `roles`, sorted.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let set: BTreeSet<Permission> = roles.iter().flat_map(Role::permissions).collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_map_to_capabilities() {
        let manager = Role::STORE_MANAGER.permissions();
        assert!(manager.contains(&Permission::TRANSFERS_CREATE));
        assert!(!manager.contains(&Permission::TRANSFERS_APPROVE));

        let head = Role::REGIONAL_HEAD.permissions();
        assert!(head.contains(&Permission::TRANSFERS_APPROVE));
        assert!(!head.contains(&Permission::INVENTORY_WRITE));

        assert_eq!(Role::ADMIN.permissions(), vec![Permission::WILDCARD]);
        assert!(Role::new("viewer").permissions().is_empty());
    }

    #[test]
    fn union_is_deduplicated() {
        let perms = permissions_for_roles(&[Role::STORE_MANAGER, Role::REGIONAL_HEAD]);
        let reads = perms.iter().filter(|p| **p == Permission::INVENTORY_READ).count();
        assert_eq!(reads, 1);
    }
}
