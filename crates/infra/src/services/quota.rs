//! Quota engine: counting, checks and counter bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use jobboard_companies::Company;
use jobboard_jobs::{Job, QuotaIntent, check_account, plan_shrink, trusted_cached_count};
use jobboard_core::DomainError;

use super::ServiceResult;
use crate::store::{CompanyStore, JobFilter, JobStore};

/// Result of trimming a company's active jobs to a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ShrinkReport {
    pub kept: u32,
    pub deactivated: u64,
}

#[derive(Clone)]
pub struct QuotaEngine {
    companies: Arc<dyn CompanyStore>,
    jobs: Arc<dyn JobStore>,
}

impl QuotaEngine {
    pub fn new(companies: Arc<dyn CompanyStore>, jobs: Arc<dyn JobStore>) -> Self {
        Self { companies, jobs }
    }

    /// Active jobs for the company: the cached counter when it looks sane,
    /// otherwise a recount, which is written back so later increments start
    /// from the real number.
    pub async fn active_job_count(&self, company: &Company) -> ServiceResult<u32> {
        if let Some(count) = trusted_cached_count(company) {
            return Ok(count);
        }
        let count = self.jobs.count_active(company.email()).await?;
        debug!(company = %company.email(), count, "recounted active jobs");
        if let Err(e) = self.companies.set_active_job_count(company.email(), count).await {
            warn!(company = %company.email(), error = %e, "failed to store recounted active jobs");
        }
        Ok(count)
    }

    /// Refuse with the specific reason, or allow.
    pub async fn can_create_or_activate(
        &self,
        company: &Company,
        intent: QuotaIntent,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        check_account(company, intent, now).map_err(DomainError::from)?;
        let active = self.active_job_count(company).await?;
        jobboard_jobs::can_create_or_activate(company, active, intent, now)
            .map_err(DomainError::from)?;
        Ok(())
    }

    /// Activate the job and bump the counter. Returns `false` when the job
    /// was already active.
    pub async fn record_activation(
        &self,
        job: &mut Job,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        if !job.activate(now) {
            return Ok(false);
        }
        self.jobs.save(job).await?;
        self.adjust_counter(job.company_email(), 1).await;
        Ok(true)
    }

    /// Deactivate the job and decrement the counter (floored at zero).
    pub async fn record_deactivation(
        &self,
        job: &mut Job,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        if !job.deactivate(now) {
            return Ok(false);
        }
        self.jobs.save(job).await?;
        self.adjust_counter(job.company_email(), -1).await;
        Ok(true)
    }

    /// Best-effort counter move after a job write. A cold counter is
    /// recounted instead; remaining drift is healed by the sweeper.
    pub async fn adjust_counter(&self, email: &str, delta: i64) {
        let cold = match self.companies.find_by_email(email).await {
            Ok(Some(company)) => trusted_cached_count(&company).is_none(),
            Ok(None) => false,
            Err(e) => {
                warn!(company = %email, error = %e, "failed to load company for counter move");
                false
            }
        };
        if cold {
            if let Err(e) = self.heal_counter(email).await {
                warn!(company = %email, error = %e, "failed to recount active jobs");
            }
            return;
        }
        if let Err(e) = self.companies.adjust_active_job_count(email, delta).await {
            warn!(company = %email, delta, error = %e, "failed to adjust active job counter");
        }
    }

    /// Keep the `limit` newest active jobs and deactivate the rest.
    pub async fn shrink_to_limit(
        &self,
        email: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> ServiceResult<ShrinkReport> {
        let active = self.jobs.list(&JobFilter::active_for(email)).await?;
        let plan = plan_shrink(&active, limit);
        let deactivated = self.jobs.deactivate(&plan.evict, now).await?;
        let kept = u32::try_from(plan.keep.len()).unwrap_or(u32::MAX);

        if let Err(e) = self.companies.set_active_job_count(email, kept).await {
            warn!(company = %email, error = %e, "failed to reset active job counter");
        }
        info!(company = %email, limit, kept, deactivated, "active jobs trimmed to limit");
        Ok(ShrinkReport { kept, deactivated })
    }

    /// Recount and overwrite the cached counter.
    pub async fn heal_counter(&self, email: &str) -> ServiceResult<u32> {
        let count = self.jobs.count_active(email).await?;
        self.companies.set_active_job_count(email, count).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use jobboard_jobs::JobStatus;

    use crate::services::ServiceError;
    use crate::services::testing::{Harness, test_time};

    fn engine(h: &Harness) -> QuotaEngine {
        QuotaEngine::new(h.companies.clone(), h.jobs.clone())
    }

    #[tokio::test]
    async fn full_quota_denied_then_allowed_after_deactivation() {
        let h = Harness::new();
        let quota = engine(&h);
        let company = h.approved_company("hr@pied.io", "pied").await;
        let mut jobs = Vec::new();
        for i in 0..3 {
            jobs.push(h.seed_job(&company, &format!("Role {i}"), test_time()).await);
        }

        // Counter is still 0 (cold), so the check recounts, sees 3/3 and
        // stores the recount.
        let err = quota
            .can_create_or_activate(&company, QuotaIntent::Create, test_time())
            .await
            .unwrap_err();
        match err {
            ServiceError::Domain(DomainError::Forbidden(msg))
                if msg.contains("job limit reached") => {}
            other => panic!("Expected limit reached, got {other:?}"),
        }

        assert_eq!(
            h.company("hr@pied.io").await.cached_active_job_count(),
            Some(3)
        );

        assert!(quota.record_deactivation(&mut jobs[0], test_time()).await.unwrap());
        let company = h.company("hr@pied.io").await;
        assert_eq!(company.cached_active_job_count(), Some(2));
        quota
            .can_create_or_activate(&company, QuotaIntent::Create, test_time())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn activation_bumps_counter_and_syncs_status() {
        let h = Harness::new();
        let quota = engine(&h);
        let company = h.approved_company("hr@pied.io", "pied").await;
        let mut job = h.seed_job(&company, "Role", test_time()).await;
        quota.record_deactivation(&mut job, test_time()).await.unwrap();

        h.companies.set_active_job_count("hr@pied.io", 2).await.unwrap();
        let company = h.company("hr@pied.io").await;
        assert_eq!(quota.active_job_count(&company).await.unwrap(), 2);
        quota
            .can_create_or_activate(&company, QuotaIntent::Activate, test_time())
            .await
            .unwrap();

        assert!(quota.record_activation(&mut job, test_time()).await.unwrap());
        assert!(!quota.record_activation(&mut job, test_time()).await.unwrap());

        let stored = h.job(job.id_typed()).await;
        assert!(stored.is_active());
        assert_eq!(stored.status().as_str(), "active");
        assert_eq!(
            h.company("hr@pied.io").await.cached_active_job_count(),
            Some(3)
        );
    }

    #[tokio::test]
    async fn deactivation_counter_never_goes_negative() {
        let h = Harness::new();
        let quota = engine(&h);
        let company = h.approved_company("hr@pied.io", "pied").await;
        let mut job = h.seed_job(&company, "Role", test_time()).await;

        quota.record_deactivation(&mut job, test_time()).await.unwrap();
        assert_eq!(
            h.company("hr@pied.io").await.cached_active_job_count(),
            Some(0)
        );
    }

    #[tokio::test]
    async fn shrink_keeps_newest_and_resets_counter() {
        let h = Harness::new();
        let quota = engine(&h);
        let company = h.approved_company("hr@pied.io", "pied").await;
        let t1 = h.seed_job(&company, "T1", test_time()).await;
        let t2 = h.seed_job(&company, "T2", test_time() + Duration::hours(1)).await;
        let t3 = h.seed_job(&company, "T3", test_time() + Duration::hours(2)).await;

        let report = quota.shrink_to_limit("hr@pied.io", 1, test_time()).await.unwrap();
        assert_eq!(report, ShrinkReport { kept: 1, deactivated: 2 });
        let kept = h.job(t3.id_typed()).await;
        assert!(kept.is_active());
        assert_eq!(kept.status(), JobStatus::Active);
        for id in [t2.id_typed(), t1.id_typed()] {
            let job = h.job(id).await;
            assert!(!job.is_active());
            assert_eq!(job.status(), JobStatus::Inactive);
        }
        assert_eq!(
            h.company("hr@pied.io").await.cached_active_job_count(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn heal_counter_overwrites_drift() {
        let h = Harness::new();
        let quota = engine(&h);
        let company = h.approved_company("hr@pied.io", "pied").await;
        h.seed_job(&company, "Role", test_time()).await;
        h.companies.set_active_job_count("hr@pied.io", 9).await.unwrap();

        assert_eq!(quota.heal_counter("hr@pied.io").await.unwrap(), 1);
        assert_eq!(
            h.company("hr@pied.io").await.cached_active_job_count(),
            Some(1)
        );
    }
}
