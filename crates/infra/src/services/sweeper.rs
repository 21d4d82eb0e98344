//! Scheduled subscription sweep.
//!
//! Scans every paid company with an end date. Seven days out and on the
//! final day it sends a reminder, at most once per reminder. Past the end it
//! downgrades to the free plan and trims active jobs to the free limit,
//! keeping the newest. Per-company failures are counted and the sweep moves
//! on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use jobboard_companies::Company;
use jobboard_plans::PlanId;

use super::{QuotaEngine, ServiceResult};
use crate::config::FrontendLinks;
use crate::notify::{Notification, NotificationDispatcher};
use crate::store::{CompanyFilter, CompanyStore};

pub const RENEWAL_REMINDER_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub reminders_sent: usize,
    pub expiry_notices_sent: usize,
    pub downgraded: usize,
    pub jobs_deactivated: u64,
    pub counters_healed: usize,
    pub failures: usize,
}

#[derive(Clone)]
pub struct ExpirySweeper {
    companies: Arc<dyn CompanyStore>,
    quota: QuotaEngine,
    notifier: NotificationDispatcher,
    links: FrontendLinks,
}

impl ExpirySweeper {
    pub fn new(
        companies: Arc<dyn CompanyStore>,
        quota: QuotaEngine,
        notifier: NotificationDispatcher,
        links: FrontendLinks,
    ) -> Self {
        Self {
            companies,
            quota,
            notifier,
            links,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let companies = self.companies.list(&CompanyFilter::expiring_paid()).await?;
        let mut report = SweepReport {
            scanned: companies.len(),
            ..SweepReport::default()
        };

        for company in companies {
            let Some(days) = company.subscription().days_remaining(now) else {
                continue;
            };
            match days {
                RENEWAL_REMINDER_DAYS | 0 => {
                    self.send_reminder(company, days, now, &mut report).await;
                }
                d if d < 0 => {
                    self.downgrade(company, now, &mut report).await;
                }
                _ => self.heal(&company, &mut report).await,
            }
        }

        info!(
            scanned = report.scanned,
            reminders = report.reminders_sent,
            expiry_notices = report.expiry_notices_sent,
            downgraded = report.downgraded,
            jobs_deactivated = report.jobs_deactivated,
            failures = report.failures,
            "subscription sweep complete"
        );
        Ok(report)
    }

    async fn send_reminder(
        &self,
        mut company: Company,
        days: i64,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) {
        self.heal(&company, report).await;
        if company.expiry_notice_sent_for(days) {
            return;
        }
        let sub = company.subscription();
        let Some(ends_at) = sub.ends_at else {
            return;
        };
        let plan_label = sub.plan_id.plan().label.to_string();
        let company_name = company.display_name().to_string();
        let notification = if days == 0 {
            Notification::ExpiresToday {
                company_name,
                plan_label,
                ends_at,
                renew_url: self.links.renew_url(),
            }
        } else {
            Notification::RenewalReminder {
                company_name,
                plan_label,
                ends_at,
                days_remaining: days,
                renew_url: self.links.renew_url(),
            }
        };

        if !self.notifier.deliver(company.email(), &notification).await {
            report.failures += 1;
            return;
        }
        if days == 0 {
            report.expiry_notices_sent += 1;
        } else {
            report.reminders_sent += 1;
        }

        company.mark_expiry_notice_sent(now);
        if let Err(e) = self.companies.save(&company).await {
            warn!(company = %company.email(), error = %e, "failed to record expiry notice");
            report.failures += 1;
        }
    }

    async fn downgrade(&self, mut company: Company, now: DateTime<Utc>, report: &mut SweepReport) {
        let email = company.email().to_string();
        let Some(from) = company.downgrade_to_free(now) else {
            return;
        };
        let free = PlanId::Free.plan();
        let note = format!(
            "Your {} plan expired. The account is now on the Free plan with {} active jobs.",
            from.plan().label,
            free.job_limit
        );
        if let Err(e) = company.post_system_message(&note, now) {
            warn!(company = %email, error = %e, "failed to note downgrade");
        }
        if let Err(e) = self.companies.save(&company).await {
            warn!(company = %email, error = %e, "failed to persist downgrade; retrying next sweep");
            report.failures += 1;
            return;
        }
        report.downgraded += 1;

        let jobs_deactivated = match self.quota.shrink_to_limit(&email, free.job_limit, now).await {
            Ok(shrink) => shrink.deactivated,
            Err(e) => {
                warn!(company = %email, error = %e, "failed to trim jobs after downgrade");
                report.failures += 1;
                0
            }
        };
        report.jobs_deactivated += jobs_deactivated;

        let notification = Notification::DowngradedToFree {
            company_name: company.display_name().to_string(),
            previous_plan_label: from.plan().label.to_string(),
            job_limit: free.job_limit,
            jobs_deactivated,
            upgrade_url: self.links.renew_url(),
        };
        if !self.notifier.deliver(&email, &notification).await {
            report.failures += 1;
        }
        info!(company = %email, from = %from, jobs_deactivated, "subscription downgraded by sweep");
    }

    async fn heal(&self, company: &Company, report: &mut SweepReport) {
        match self.quota.heal_counter(company.email()).await {
            Ok(_) => report.counters_healed += 1,
            Err(e) => {
                warn!(company = %company.email(), error = %e, "failed to heal active job counter");
                report.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jobboard_jobs::JobStatus;
    use jobboard_plans::SubscriptionWindow;

    use crate::notify::Notification;
    use crate::services::testing::{Harness, test_time};
    use crate::store::{JobFilter, JobStore};

    fn sweeper(h: &Harness) -> ExpirySweeper {
        ExpirySweeper::new(
            h.companies.clone(),
            QuotaEngine::new(h.companies.clone(), h.jobs.clone()),
            h.dispatcher(),
            h.links(),
        )
    }

    /// Approved company on `plan` whose window ends at `ends_at`.
    async fn paid_company(
        h: &Harness,
        email: &str,
        plan: PlanId,
        ends_at: DateTime<Utc>,
    ) -> Company {
        let mut company = h.approved_company(email, email.split('@').next().unwrap()).await;
        let plan = plan.plan();
        let start = ends_at - Duration::days(i64::from(plan.duration_days));
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), start);
        h.companies.save(&company).await.unwrap();
        company
    }

    #[tokio::test]
    async fn expired_company_keeps_its_newest_jobs_up_to_free_limit() {
        let h = Harness::new();
        let now = test_time();
        let company =
            paid_company(&h, "a@sterling.co", PlanId::Paid3m, now - Duration::days(2)).await;
        let mut ids = Vec::new();
        for (i, name) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            let at = now - Duration::days(30) + Duration::hours(i as i64);
            ids.push(h.seed_job(&company, name, at).await.id_typed());
        }

        let report = sweeper(&h).run(now).await.unwrap();
        assert_eq!(report.downgraded, 1);
        assert_eq!(report.jobs_deactivated, 2);

        let active: Vec<String> = h
            .jobs
            .list(&JobFilter::active_for("a@sterling.co"))
            .await
            .unwrap()
            .iter()
            .map(|job| job.content().title.clone())
            .collect();
        assert_eq!(active, vec!["E", "D", "C"]);
        for id in &ids[..2] {
            let job = h.job(*id).await;
            assert!(!job.is_active());
            assert_eq!(job.status(), JobStatus::Inactive);
        }

        let stored = h.company("a@sterling.co").await;
        assert_eq!(stored.subscription().plan_id, PlanId::Free);
        assert_eq!(stored.subscription().downgraded_from_plan, Some(PlanId::Paid3m));
        assert_eq!(stored.cached_active_job_count(), Some(3));
        assert_eq!(h.notifier.sent_kinds(), vec!["downgradedToFree"]);
    }

    #[tokio::test]
    async fn reminders_go_out_once_per_day() {
        let h = Harness::new();
        let now = test_time();
        paid_company(&h, "week@sterling.co", PlanId::Paid6m, now + Duration::days(7)).await;
        paid_company(&h, "tomorrow@sterling.co", PlanId::Paid12m, now + Duration::hours(5)).await;
        paid_company(&h, "later@sterling.co", PlanId::Paid12m, now + Duration::days(40)).await;

        let first = sweeper(&h).run(now).await.unwrap();
        assert_eq!(first.scanned, 3);
        assert_eq!(first.reminders_sent, 1);
        assert_eq!(first.expiry_notices_sent, 0);

        // Later the same day: nothing new.
        let second = sweeper(&h).run(now + Duration::hours(1)).await.unwrap();
        assert_eq!(second.reminders_sent, 0);

        let kinds = h.notifier.sent_kinds();
        assert_eq!(kinds, vec!["renewalReminder"]);
        let (recipient, notification) = &h.notifier.sent()[0];
        assert_eq!(recipient, "week@sterling.co");
        assert!(matches!(
            notification,
            Notification::RenewalReminder { days_remaining: 7, .. }
        ));
    }

    #[tokio::test]
    async fn reminder_is_not_repeated_after_utc_midnight() {
        let h = Harness::new();
        let now = test_time();
        paid_company(
            &h,
            "week@sterling.co",
            PlanId::Paid6m,
            now + Duration::days(6) + Duration::hours(18),
        )
        .await;

        let first = sweeper(&h).run(now).await.unwrap();
        assert_eq!(first.reminders_sent, 1);

        // 12:00 -> 00:00 the next day; still seven days out.
        let second = sweeper(&h).run(now + Duration::hours(12)).await.unwrap();
        assert_eq!(second.reminders_sent, 0);
        assert_eq!(h.notifier.sent_kinds(), vec!["renewalReminder"]);
    }

    #[tokio::test]
    async fn final_day_notice_follows_the_weekly_reminder() {
        let h = Harness::new();
        let now = test_time();
        paid_company(&h, "week@sterling.co", PlanId::Paid6m, now + Duration::days(7)).await;

        sweeper(&h).run(now).await.unwrap();
        let report = sweeper(&h).run(now + Duration::days(7)).await.unwrap();
        assert_eq!(report.expiry_notices_sent, 1);
        assert_eq!(h.notifier.sent_kinds(), vec!["renewalReminder", "expiresToday"]);
    }

    #[tokio::test]
    async fn final_day_notice_is_sent() {
        let h = Harness::new();
        let now = test_time();
        // Ended two hours ago: still "0 days" under round-up.
        paid_company(&h, "today@sterling.co", PlanId::Paid3m, now - Duration::hours(2)).await;

        let report = sweeper(&h).run(now).await.unwrap();
        assert_eq!(report.expiry_notices_sent, 1);
        assert_eq!(report.downgraded, 0);
        assert_eq!(h.notifier.sent_kinds(), vec!["expiresToday"]);
    }

    #[tokio::test]
    async fn failed_reminder_is_retried_on_next_run() {
        let h = Harness::new();
        let now = test_time();
        paid_company(&h, "week@sterling.co", PlanId::Paid6m, now + Duration::days(7)).await;

        h.notifier.set_failing(true);
        let report = sweeper(&h).run(now).await.unwrap();
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(report.failures, 1);
        assert_eq!(h.company("week@sterling.co").await.last_expiry_notice_sent(), None);

        h.notifier.set_failing(false);
        let report = sweeper(&h).run(now + Duration::minutes(30)).await.unwrap();
        assert_eq!(report.reminders_sent, 1);
    }

    #[tokio::test]
    async fn sweep_heals_drifted_counters() {
        let h = Harness::new();
        let now = test_time();
        let company =
            paid_company(&h, "later@sterling.co", PlanId::Paid12m, now + Duration::days(40)).await;
        h.seed_job(&company, "Role", now).await;
        h.companies
            .set_active_job_count("later@sterling.co", 11)
            .await
            .unwrap();

        let report = sweeper(&h).run(now).await.unwrap();
        assert_eq!(report.counters_healed, 1);
        assert_eq!(
            h.company("later@sterling.co").await.cached_active_job_count(),
            Some(1)
        );
    }
}
