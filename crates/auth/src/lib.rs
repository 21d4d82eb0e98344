//! `jobboard-auth` — pure authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage. Token issuance lives with the login
//! service; this crate only validates tokens and evaluates permissions.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::PrincipalId;
pub use roles::Role;
