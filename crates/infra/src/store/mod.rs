//! Persistence for companies, jobs and audit entries.
//!
//! Writes are whole-document, last-write-wins; there is no version column.
//! The cached active-job counter is the one exception: it only moves through
//! `adjust_active_job_count` / `set_active_job_count`, and `save` never
//! touches it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use jobboard_companies::{ApprovalStatus, Company};
use jobboard_core::{CompanyId, JobId};
use jobboard_jobs::Job;

use crate::audit::AuditLogEntry;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryAuditStore, InMemoryCompanyStore, InMemoryJobStore};
pub use postgres::{PostgresAuditStore, PostgresCompanyStore, PostgresJobStore};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Company listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyFilter {
    pub status: Option<ApprovalStatus>,
    /// Case-insensitive substring over email, handle and display name.
    pub search: Option<String>,
    /// Only companies on a paid plan with an end date.
    pub expiring_paid_only: bool,
}

impl CompanyFilter {
    pub fn expiring_paid() -> Self {
        Self {
            expiring_paid_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, company: &Company) -> bool {
        if self.status.is_some_and(|status| company.status() != status) {
            return false;
        }
        if let Some(search) = &self.search {
            if !company.matches_search(search) {
                return false;
            }
        }
        if self.expiring_paid_only {
            let sub = company.subscription();
            if !sub.is_paid() || sub.ends_at.is_none() {
                return false;
            }
        }
        true
    }
}

/// Job listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub company_email: Option<String>,
    pub active: Option<bool>,
}

impl JobFilter {
    pub fn active_for(company_email: &str) -> Self {
        Self {
            company_email: Some(company_email.to_string()),
            active: Some(true),
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(email) = &self.company_email {
            if !job.is_owned_by(email) {
                return false;
            }
        }
        self.active.is_none_or(|active| job.is_active() == active)
    }
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Fails with `Conflict` when the email or handle is taken.
    async fn insert(&self, company: &Company) -> StoreResult<()>;

    async fn get(&self, id: CompanyId) -> StoreResult<Option<Company>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Company>>;

    /// Replace everything except the cached active-job counter.
    async fn save(&self, company: &Company) -> StoreResult<()>;

    /// Oldest registration first.
    async fn list(&self, filter: &CompanyFilter) -> StoreResult<Vec<Company>>;

    /// Atomically add `delta` to the cached counter, flooring at zero.
    /// A missing counter counts as zero. Returns the new value.
    async fn adjust_active_job_count(&self, email: &str, delta: i64) -> StoreResult<u32>;

    async fn set_active_job_count(&self, email: &str, count: u32) -> StoreResult<()>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> StoreResult<()>;

    async fn get(&self, id: JobId) -> StoreResult<Option<Job>>;

    async fn save(&self, job: &Job) -> StoreResult<()>;

    /// Returns the removed job, if it existed.
    async fn delete(&self, id: JobId) -> StoreResult<Option<Job>>;

    /// Newest first.
    async fn list(&self, filter: &JobFilter) -> StoreResult<Vec<Job>>;

    async fn count_active(&self, company_email: &str) -> StoreResult<u32>;

    /// Deactivate the given jobs (flag and legacy status together).
    /// Returns how many were active before.
    async fn deactivate(&self, ids: &[JobId], now: DateTime<Utc>) -> StoreResult<u64>;

    async fn deactivate_all_for_company(
        &self,
        company_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()>;

    /// Newest first.
    async fn list(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>>;
}

/// Normalized lookup key for company emails.
pub(crate) fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
