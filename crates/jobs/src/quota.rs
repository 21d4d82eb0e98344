//! Pure quota rules.
//!
//! The async engine in `jobboard-infra` loads the company and its jobs, then
//! delegates every decision to the functions here.

use chrono::{DateTime, Utc};

use jobboard_companies::{ApprovalStatus, Company};
use jobboard_core::{DomainError, JobId};

use crate::job::Job;

/// What the caller is about to do with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaIntent {
    Create,
    Activate,
}

/// Why a create/activate was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDenial {
    AccountOnHold,
    AccountDenied,
    NotApproved,
    SubscriptionExpired,
    LimitReached { limit: u32, active: u32 },
}

impl core::fmt::Display for QuotaDenial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QuotaDenial::AccountOnHold => f.write_str("account on hold, cannot post jobs"),
            QuotaDenial::AccountDenied => f.write_str("account denied"),
            QuotaDenial::NotApproved => f.write_str("account not approved"),
            QuotaDenial::SubscriptionExpired => {
                f.write_str("subscription expired, cannot activate")
            }
            QuotaDenial::LimitReached { limit, active } => write!(
                f,
                "job limit reached ({active}/{limit} active), upgrade your plan or deactivate a job"
            ),
        }
    }
}

impl From<QuotaDenial> for DomainError {
    fn from(denial: QuotaDenial) -> Self {
        DomainError::forbidden(denial.to_string())
    }
}

/// Account-level checks that do not need a job count.
pub fn check_account(
    company: &Company,
    intent: QuotaIntent,
    now: DateTime<Utc>,
) -> Result<(), QuotaDenial> {
    match company.status() {
        ApprovalStatus::Hold => return Err(QuotaDenial::AccountOnHold),
        ApprovalStatus::Denied => return Err(QuotaDenial::AccountDenied),
        ApprovalStatus::Pending | ApprovalStatus::Approved => {}
    }
    if !company.approved() {
        return Err(QuotaDenial::NotApproved);
    }
    if intent == QuotaIntent::Activate && company.subscription().is_expired(now) {
        return Err(QuotaDenial::SubscriptionExpired);
    }
    Ok(())
}

/// Full decision given the company's active-job count.
pub fn can_create_or_activate(
    company: &Company,
    active_jobs: u32,
    intent: QuotaIntent,
    now: DateTime<Utc>,
) -> Result<(), QuotaDenial> {
    check_account(company, intent, now)?;
    let limit = company.subscription().job_limit;
    if active_jobs >= limit {
        return Err(QuotaDenial::LimitReached {
            limit,
            active: active_jobs,
        });
    }
    Ok(())
}

/// The cached counter, if it can be trusted.
///
/// Zero or missing is treated as cold; callers recount the real jobs.
pub fn trusted_cached_count(company: &Company) -> Option<u32> {
    company.cached_active_job_count().filter(|count| *count > 0)
}

/// Which active jobs survive a shrink to `limit`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShrinkPlan {
    /// Newest first.
    pub keep: Vec<JobId>,
    /// Jobs to deactivate, newest first.
    pub evict: Vec<JobId>,
}

/// Keep the `limit` most recently created active jobs, evict the rest.
///
/// Inactive jobs in the input are ignored. Ties on `created_at` fall back to
/// the id, which is time-ordered.
pub fn plan_shrink(jobs: &[Job], limit: u32) -> ShrinkPlan {
    let mut active: Vec<&Job> = jobs.iter().filter(|job| job.is_active()).collect();
    active.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id_typed().cmp(&a.id_typed()))
    });

    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let split = limit.min(active.len());
    let (keep, evict) = active.split_at(split);
    ShrinkPlan {
        keep: keep.iter().map(|job| job.id_typed()).collect(),
        evict: evict.iter().map(|job| job.id_typed()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use jobboard_companies::NewCompany;
    use jobboard_core::CompanyId;
    use jobboard_plans::{PlanId, SubscriptionWindow};
    use proptest::prelude::*;

    use crate::job::JobContent;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 10, 0, 0).unwrap()
    }

    fn approved_company() -> Company {
        let mut company = Company::register(
            CompanyId::new(),
            NewCompany {
                email: "hr@umbrella.com".to_string(),
                handle: "umbrella".to_string(),
                display_name: "Umbrella".to_string(),
                contact_name: None,
            },
            test_time(),
        )
        .unwrap();
        company.approve(test_time());
        company
    }

    fn job_at(company: &Company, created_at: DateTime<Utc>) -> Job {
        Job::post(
            JobId::new(),
            company,
            JobContent {
                title: "Analyst".to_string(),
                ..JobContent::default()
            },
            created_at,
        )
        .unwrap()
    }

    #[test]
    fn full_quota_is_denied_and_one_free_slot_is_allowed() {
        let company = approved_company();
        assert_eq!(company.subscription().job_limit, 3);

        match can_create_or_activate(&company, 3, QuotaIntent::Create, test_time()) {
            Err(QuotaDenial::LimitReached { limit: 3, active: 3 }) => {}
            other => panic!("Expected limit reached, got {other:?}"),
        }
        assert!(can_create_or_activate(&company, 2, QuotaIntent::Create, test_time()).is_ok());
    }

    #[test]
    fn hold_and_denied_are_refused_before_quota() {
        let mut company = approved_company();
        company.hold("verify address", test_time()).unwrap();
        assert_eq!(
            can_create_or_activate(&company, 0, QuotaIntent::Create, test_time()),
            Err(QuotaDenial::AccountOnHold)
        );

        company.deny("spam", test_time()).unwrap();
        let err: DomainError = can_create_or_activate(&company, 0, QuotaIntent::Create, test_time())
            .unwrap_err()
            .into();
        assert_eq!(err, DomainError::Forbidden("account denied".to_string()));
    }

    #[test]
    fn pending_company_is_not_approved() {
        let mut company = approved_company();
        company.revoke_access(None, test_time());
        assert_eq!(
            check_account(&company, QuotaIntent::Create, test_time()),
            Err(QuotaDenial::NotApproved)
        );
    }

    #[test]
    fn expired_subscription_blocks_activation_only() {
        let mut company = approved_company();
        let plan = PlanId::Paid3m.plan();
        let start = test_time() - Duration::days(120);
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), start);

        assert_eq!(
            can_create_or_activate(&company, 0, QuotaIntent::Activate, test_time()),
            Err(QuotaDenial::SubscriptionExpired)
        );
        assert_eq!(
            QuotaDenial::SubscriptionExpired.to_string(),
            "subscription expired, cannot activate"
        );
        assert!(can_create_or_activate(&company, 0, QuotaIntent::Create, test_time()).is_ok());
    }

    #[test]
    fn cold_counter_is_not_trusted() {
        let mut company = approved_company();
        assert_eq!(trusted_cached_count(&company), None);
        company.set_cached_active_job_count(2);
        assert_eq!(trusted_cached_count(&company), Some(2));
    }

    #[test]
    fn shrink_to_one_keeps_newest() {
        let company = approved_company();
        let t1 = job_at(&company, test_time());
        let t2 = job_at(&company, test_time() + Duration::hours(1));
        let t3 = job_at(&company, test_time() + Duration::hours(2));

        let plan = plan_shrink(&[t2.clone(), t1.clone(), t3.clone()], 1);
        assert_eq!(plan.keep, vec![t3.id_typed()]);
        assert_eq!(plan.evict, vec![t2.id_typed(), t1.id_typed()]);
    }

    #[test]
    fn shrink_ignores_inactive_jobs() {
        let company = approved_company();
        let mut old = job_at(&company, test_time());
        old.deactivate(test_time());
        let new = job_at(&company, test_time() + Duration::hours(1));

        let plan = plan_shrink(&[old, new.clone()], 0);
        assert!(plan.keep.is_empty());
        assert_eq!(plan.evict, vec![new.id_typed()]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: a shrink keeps exactly min(limit, active) jobs and every
        /// kept job is at least as new as every evicted one.
        #[test]
        fn shrink_keeps_newest_up_to_limit(
            offsets in prop::collection::vec(0i64..10_000, 0..25),
            limit in 0u32..30,
        ) {
            let company = approved_company();
            let jobs: Vec<Job> = offsets
                .iter()
                .map(|offset| job_at(&company, test_time() + Duration::minutes(*offset)))
                .collect();

            let plan = plan_shrink(&jobs, limit);
            prop_assert_eq!(plan.keep.len(), jobs.len().min(limit as usize));
            prop_assert_eq!(plan.keep.len() + plan.evict.len(), jobs.len());

            let created = |id: &JobId| {
                jobs.iter().find(|job| job.id_typed() == *id).map(|job| job.created_at())
            };
            let oldest_kept = plan.keep.iter().filter_map(created).min();
            let newest_evicted = plan.evict.iter().filter_map(created).max();
            if let (Some(kept), Some(evicted)) = (oldest_kept, newest_evicted) {
                prop_assert!(kept >= evicted);
            }
        }
    }
}
