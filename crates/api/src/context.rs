use jobboard_auth::{PrincipalId, Role};
use jobboard_core::AdminId;

/// Principal context for a request (authenticated identity, roles and, for
/// company tokens, the account email).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
    email: Option<String>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>, email: Option<String>) -> Self {
        Self {
            principal_id,
            roles,
            email,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Administrator identity recorded in audit entries.
    pub fn admin_id(&self) -> AdminId {
        AdminId::from_uuid(*self.principal_id.as_uuid())
    }
}
