//! `wgrid-auth` — pure authorization boundary.
//!
//! Tokens are issued elsewhere; this crate validates them and answers "may
//! this principal perform this capability on this store". It is decoupled
//! from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, authorize_any, AuthzError, Principal};
pub use claims::{validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use permissions::Permission;
pub use principal::{PrincipalId, StoreScope};
pub use roles::{permissions_for_roles, Role};
