//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Persistence and
/// transport concerns have their own error types in `jobboard-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (missing reason text, malformed email, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A company, job or plan could not be found.
    #[error("{0} not found")]
    NotFound(String),

    /// The plan identifier is not part of the catalog.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A payment or webhook signature did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// The action is not permitted (quota, account state, role).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_plan(plan_id: impl Into<String>) -> Self {
        Self::InvalidPlan(plan_id.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::InvalidPlan(_) => "invalid_plan",
            Self::InvalidSignature => "invalid_signature",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
        }
    }
}
