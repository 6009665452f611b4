use serde::Serialize;
use thiserror::Error;

use wgrid_core::{EngineError, StoreId};

use crate::{permissions_for_roles, JwtClaims, Permission, PrincipalId, Role, StoreScope};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub roles: Vec<Role>,
    /// Effective capabilities (from roles).
    pub permissions: Vec<Permission>,
    pub store_scope: StoreScope,
}

impl Principal {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>, store_scope: StoreScope) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            principal_id,
            roles,
            permissions,
            store_scope,
        }
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self::new(claims.sub, claims.roles.clone(), claims.store_scope.clone())
    }

    /// Stable actor name recorded in audit trails.
    pub fn actor(&self) -> String {
        self.principal_id.to_string()
    }

    pub fn has(&self, required: &Permission) -> bool {
        self.permissions.iter().any(|p| p.grants(required))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: '{0}' is outside the principal's store scope")]
    OutOfScope(String),
}

impl From<AuthzError> for EngineError {
    fn from(err: AuthzError) -> Self {
        EngineError::forbidden(err.to_string())
    }
}

/// Single capability + store-scope check.
///
/// - No IO
/// - No panics
/// - `stores` lists every store the intent touches; all must be in scope.
pub fn authorize(principal: &Principal, required: &Permission, stores: &[&StoreId]) -> Result<(), AuthzError> {
    if !principal.has(required) {
        return Err(AuthzError::Forbidden(required.as_str().to_string()));
    }
    if let Some(outside) = stores.iter().find(|s| !principal.store_scope.allows(s)) {
        return Err(AuthzError::OutOfScope(outside.to_string()));
    }
    Ok(())
}

/// Like [`authorize`], but one of `stores` being in scope is enough.
///
/// Used for intents on a transfer, where acting from either end is legitimate.
pub fn authorize_any(principal: &Principal, required: &Permission, stores: &[&StoreId]) -> Result<(), AuthzError> {
    if !principal.has(required) {
        return Err(AuthzError::Forbidden(required.as_str().to_string()));
    }
    if stores.is_empty() || stores.iter().any(|s| principal.store_scope.allows(s)) {
        return Ok(());
    }
    let listed: Vec<String> = stores.iter().map(|s| s.to_string()).collect();
    Err(AuthzError::OutOfScope(listed.join(", ")))
}
