use wgrid_auth::{JwtClaims, Principal};

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; every domain route extracts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            principal: Principal::from_claims(claims),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
