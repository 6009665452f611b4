use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Capability identifier, `"area:action"` (e.g. `"inventory:read"`).
///
/// The wildcard `"*"` grants every capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory:read"));
    pub const INVENTORY_WRITE: Permission = Permission(Cow::Borrowed("inventory:write"));
    pub const TRANSFERS_CREATE: Permission = Permission(Cow::Borrowed("transfers:create"));
    pub const TRANSFERS_APPROVE: Permission = Permission(Cow::Borrowed("transfers:approve"));
    pub const REPORTS_READ: Permission = Permission(Cow::Borrowed("reports:read"));
    pub const ANALYTICS_READ: Permission = Permission(Cow::Borrowed("analytics:read"));
    pub const ANOMALIES_MANAGE: Permission = Permission(Cow::Borrowed("anomalies:manage"));
    pub const USERS_MANAGE: Permission = Permission(Cow::Borrowed("users:manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Whether holding `self` satisfies a check for `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        self.is_wildcard() || self == required
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
