//! Read-time subscription expiry.
//!
//! Runs in front of a company-scoped job listing. An expired paid company is
//! downgraded to the free plan and loses every active job; trimming to the
//! free limit is left to the sweeper. Nothing here fails the listing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use jobboard_plans::PlanId;

use crate::store::{CompanyStore, JobStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// Company unknown or could not be loaded.
    Skipped,
    /// Subscription still valid, nothing to do.
    Current,
    Downgraded { from: PlanId, jobs_deactivated: u64 },
}

#[derive(Clone)]
pub struct LazyExpiryEnforcer {
    companies: Arc<dyn CompanyStore>,
    jobs: Arc<dyn JobStore>,
}

impl LazyExpiryEnforcer {
    pub fn new(companies: Arc<dyn CompanyStore>, jobs: Arc<dyn JobStore>) -> Self {
        Self { companies, jobs }
    }

    pub async fn enforce(&self, email: &str, now: DateTime<Utc>) -> ExpiryOutcome {
        let mut company = match self.companies.find_by_email(email).await {
            Ok(Some(company)) => company,
            Ok(None) => return ExpiryOutcome::Skipped,
            Err(e) => {
                warn!(company = %email, error = %e, "expiry check could not load company");
                return ExpiryOutcome::Skipped;
            }
        };

        if !company.subscription().is_expired(now) {
            return ExpiryOutcome::Current;
        }
        let Some(from) = company.downgrade_to_free(now) else {
            return ExpiryOutcome::Current;
        };

        let note = format!(
            "Your {} plan expired. The account is now on the Free plan \
             and all jobs were deactivated.",
            from.plan().label
        );
        if let Err(e) = company.post_system_message(&note, now) {
            warn!(company = %email, error = %e, "failed to note downgrade");
        }
        if let Err(e) = self.companies.save(&company).await {
            warn!(company = %email, error = %e, "failed to persist lazy downgrade");
        }

        let jobs_deactivated = match self.jobs.deactivate_all_for_company(email, now).await {
            Ok(n) => n,
            Err(e) => {
                warn!(company = %email, error = %e, "failed to deactivate jobs after expiry");
                0
            }
        };
        if let Err(e) = self.companies.set_active_job_count(email, 0).await {
            warn!(company = %email, error = %e, "failed to reset active job counter");
        }

        info!(
            company = %email,
            from = %from,
            jobs_deactivated,
            "expired subscription downgraded on read"
        );
        ExpiryOutcome::Downgraded {
            from,
            jobs_deactivated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jobboard_plans::SubscriptionWindow;

    use crate::services::testing::{Harness, test_time};
    use crate::store::JobFilter;
    use jobboard_jobs::JobStatus;

    fn enforcer(h: &Harness) -> LazyExpiryEnforcer {
        LazyExpiryEnforcer::new(h.companies.clone(), h.jobs.clone())
    }

    #[tokio::test]
    async fn expired_paid_company_is_downgraded_and_all_jobs_deactivated() {
        let h = Harness::new();
        let mut company = h.approved_company("ops@hooli.xyz", "hooli").await;
        let plan = PlanId::Paid6m.plan();
        let start = test_time() - Duration::days(181);
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), start);
        h.companies.save(&company).await.unwrap();
        let mut ids = Vec::new();
        for i in 0..12 {
            let job = h.seed_job(&company, &format!("Role {i}"), start + Duration::days(i)).await;
            ids.push(job.id_typed());
        }

        let outcome = enforcer(&h).enforce("ops@hooli.xyz", test_time()).await;
        assert_eq!(
            outcome,
            ExpiryOutcome::Downgraded {
                from: PlanId::Paid6m,
                jobs_deactivated: 12
            }
        );

        let stored = h.company("ops@hooli.xyz").await;
        let sub = stored.subscription();
        assert_eq!(sub.plan_id, PlanId::Free);
        assert_eq!(sub.job_limit, 3);
        assert_eq!(sub.ends_at, None);
        assert_eq!(sub.downgraded_from_plan, Some(PlanId::Paid6m));
        assert_eq!(stored.cached_active_job_count(), Some(0));
        assert!(
            h.jobs
                .list(&JobFilter::active_for("ops@hooli.xyz"))
                .await
                .unwrap()
                .is_empty()
        );
        for id in ids {
            let job = h.job(id).await;
            assert!(!job.is_active());
            assert_eq!(job.status(), JobStatus::Inactive);
        }

        // Second read finds a non-expiring free plan.
        assert_eq!(
            enforcer(&h).enforce("ops@hooli.xyz", test_time()).await,
            ExpiryOutcome::Current
        );
    }

    #[tokio::test]
    async fn expired_three_month_plan_with_full_quota_drops_to_free() {
        let h = Harness::new();
        let now = test_time();
        let mut company = h.approved_company("talent@initech.com", "initech").await;
        let plan = PlanId::Paid3m.plan();
        assert_eq!(plan.job_limit, 15);
        let start = now - Duration::days(95);
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), start);
        h.companies.save(&company).await.unwrap();
        let mut ids = Vec::new();
        for i in 0..15 {
            let job = h.seed_job(&company, &format!("Role {i}"), start + Duration::hours(i)).await;
            ids.push(job.id_typed());
        }
        h.companies.set_active_job_count("talent@initech.com", 15).await.unwrap();

        let outcome = enforcer(&h).enforce("talent@initech.com", now).await;
        assert_eq!(
            outcome,
            ExpiryOutcome::Downgraded {
                from: PlanId::Paid3m,
                jobs_deactivated: 15
            }
        );

        let stored = h.company("talent@initech.com").await;
        let sub = stored.subscription();
        assert_eq!(sub.plan_id, PlanId::Free);
        assert_eq!(sub.job_limit, 3);
        assert_eq!(sub.ends_at, None);
        assert_eq!(sub.downgraded_from_plan, Some(PlanId::Paid3m));
        for id in ids {
            let job = h.job(id).await;
            assert!(!job.is_active());
            assert_eq!(job.status(), JobStatus::Inactive);
        }
    }

    #[tokio::test]
    async fn current_and_unknown_companies_are_left_alone() {
        let h = Harness::new();
        let company = h.approved_company("ops@hooli.xyz", "hooli").await;
        h.seed_job(&company, "Role", test_time()).await;

        assert_eq!(
            enforcer(&h).enforce("ops@hooli.xyz", test_time()).await,
            ExpiryOutcome::Current
        );
        assert_eq!(
            enforcer(&h).enforce("nobody@hooli.xyz", test_time()).await,
            ExpiryOutcome::Skipped
        );
        assert_eq!(h.jobs.count_active("ops@hooli.xyz").await.unwrap(), 1);
    }
}
