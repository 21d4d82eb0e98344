//! API-side authorization guard.
//!
//! Roles from the token are expanded into permissions here, then checked
//! with the pure policy in `jobboard-auth`. Services stay auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use jobboard_auth::{AuthzError, Permission, Principal, Role, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// Check a single permission for the current request.
pub fn require(principal: &PrincipalContext, required: &Permission) -> Result<(), Response> {
    let resolved = Principal {
        principal_id: principal.principal_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    authorize(&resolved, required).map_err(|AuthzError::Forbidden(perm)| {
        json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("missing permission '{perm}'"),
        )
    })
}

/// Email of a company principal. Self-service routes act on this account
/// only, never on an email from the request body.
pub fn require_company(principal: &PrincipalContext) -> Result<String, Response> {
    require(principal, &Permission::JOBS_MANAGE_OWN)?;
    principal.email().map(str::to_string).ok_or_else(|| {
        json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "company token carries no email",
        )
    })
}

/// Static role→permission mapping.
fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut permissions = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            "super_admin" => vec![
                Permission::COMPANIES_REVIEW,
                Permission::COMPANIES_MESSAGE,
                Permission::JOBS_OVERRIDE,
                Permission::AUDIT_READ,
                Permission::SUBSCRIPTIONS_SWEEP,
            ],
            "admin" => vec![
                Permission::COMPANIES_REVIEW,
                Permission::COMPANIES_MESSAGE,
                Permission::JOBS_OVERRIDE,
            ],
            "company" => vec![Permission::JOBS_MANAGE_OWN],
            _ => Vec::new(),
        };
        for perm in granted {
            if !permissions.contains(&perm) {
                permissions.push(perm);
            }
        }
    }
    permissions
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_auth::PrincipalId;

    fn principal(roles: Vec<Role>, email: Option<&str>) -> PrincipalContext {
        PrincipalContext::new(PrincipalId::new(), roles, email.map(str::to_string))
    }

    #[test]
    fn admin_reviews_but_cannot_read_audit() {
        let admin = principal(vec![Role::ADMIN], None);
        assert!(require(&admin, &Permission::COMPANIES_REVIEW).is_ok());
        assert!(require(&admin, &Permission::JOBS_OVERRIDE).is_ok());
        assert!(require(&admin, &Permission::AUDIT_READ).is_err());
        assert!(require(&admin, &Permission::SUBSCRIPTIONS_SWEEP).is_err());
    }

    #[test]
    fn super_admin_holds_every_admin_permission() {
        let root = principal(vec![Role::SUPER_ADMIN], None);
        for perm in [
            Permission::COMPANIES_REVIEW,
            Permission::COMPANIES_MESSAGE,
            Permission::JOBS_OVERRIDE,
            Permission::AUDIT_READ,
            Permission::SUBSCRIPTIONS_SWEEP,
        ] {
            assert!(require(&root, &perm).is_ok(), "{}", perm.as_str());
        }
        assert!(require(&root, &Permission::JOBS_MANAGE_OWN).is_err());
    }

    #[test]
    fn moderator_has_no_permissions() {
        let moderator = principal(vec![Role::MODERATOR], None);
        assert!(require(&moderator, &Permission::COMPANIES_REVIEW).is_err());
    }

    #[test]
    fn company_scope_needs_role_and_email() {
        let company = principal(vec![Role::COMPANY], Some("hr@initech.com"));
        assert_eq!(require_company(&company).unwrap(), "hr@initech.com");

        let anonymous = principal(vec![Role::COMPANY], None);
        assert!(require_company(&anonymous).is_err());

        let admin = principal(vec![Role::ADMIN], Some("ops@jobs.example.com"));
        assert!(require_company(&admin).is_err());
    }
}
