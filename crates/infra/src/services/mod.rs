//! Application services.
//!
//! Each service loads entities from the stores, runs the domain rules, saves
//! the primary mutation and then fires secondary effects (audit entries,
//! notifications, counter adjustments). Secondary effects never fail the
//! call that produced them.

use thiserror::Error;

use jobboard_core::DomainError;

use crate::provider::ProviderError;
use crate::store::StoreError;

pub mod expiry;
pub mod jobs;
pub mod lifecycle;
pub mod payments;
pub mod quota;
pub mod sweeper;

pub use expiry::{ExpiryOutcome, LazyExpiryEnforcer};
pub use jobs::{JobBoard, JobQuery};
pub use lifecycle::{CompanyLifecycle, MessagePage};
pub use payments::{
    ACTIVATION_DEDUPE_MINUTES, ActivationOutcome, ActivationRequest, CallbackVerification,
    OrderOutcome, PaymentReconciler, WebhookOutcome,
};
pub use quota::{QuotaEngine, ShrinkReport};
pub use sweeper::{ExpirySweeper, SweepReport};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0} not configured")]
    NotConfigured(&'static str),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::Domain(DomainError::not_found(what))
    }
}
