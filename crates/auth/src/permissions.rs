use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "companies.review"). The wildcard
/// `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Approve, hold, deny and revoke companies; list them.
    pub const COMPANIES_REVIEW: Permission = Permission(Cow::Borrowed("companies.review"));
    /// Post admin messages to a company.
    pub const COMPANIES_MESSAGE: Permission = Permission(Cow::Borrowed("companies.message"));
    /// Toggle any job regardless of quota.
    pub const JOBS_OVERRIDE: Permission = Permission(Cow::Borrowed("jobs.override"));
    /// Create and manage the caller's own jobs and message thread.
    pub const JOBS_MANAGE_OWN: Permission = Permission(Cow::Borrowed("jobs.manage_own"));
    pub const AUDIT_READ: Permission = Permission(Cow::Borrowed("audit.read"));
    /// Trigger the subscription sweep on demand.
    pub const SUBSCRIPTIONS_SWEEP: Permission = Permission(Cow::Borrowed("subscriptions.sweep"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
