use std::collections::HashSet;

use thiserror::Error;

use crate::{Permission, PrincipalId, Role};

/// A fully resolved principal for authorization decisions.
///
/// The API derives permissions from the token's roles; this type does not
/// know where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(permissions: Vec<Permission>) -> Principal {
        Principal {
            principal_id: PrincipalId::new(),
            roles: vec![Role::ADMIN],
            permissions,
        }
    }

    #[test]
    fn explicit_permission_is_granted() {
        let p = principal(vec![Permission::COMPANIES_REVIEW]);
        assert!(authorize(&p, &Permission::COMPANIES_REVIEW).is_ok());
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(vec![Permission::new("*")]);
        assert!(authorize(&p, &Permission::AUDIT_READ).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let p = principal(vec![Permission::JOBS_MANAGE_OWN]);
        assert_eq!(
            authorize(&p, &Permission::JOBS_OVERRIDE),
            Err(AuthzError::Forbidden("jobs.override".to_string()))
        );
    }
}
