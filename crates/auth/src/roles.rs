use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier carried in tokens.
///
/// Roles stay opaque strings at this layer; the API maps them to permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const SUPER_ADMIN: Role = Role(Cow::Borrowed("super_admin"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const MODERATOR: Role = Role(Cow::Borrowed("moderator"));
    pub const COMPANY: Role = Role(Cow::Borrowed("company"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `admin` or `super_admin`: allowed to run privileged lifecycle actions.
    pub fn is_administrator(&self) -> bool {
        matches!(self.as_str(), "admin" | "super_admin")
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_roles_are_administrators() {
        assert!(Role::ADMIN.is_administrator());
        assert!(Role::new("super_admin").is_administrator());
        assert!(!Role::MODERATOR.is_administrator());
        assert!(!Role::COMPANY.is_administrator());
    }
}
