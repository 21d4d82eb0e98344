//! Job postings: listing, CRUD and activation toggles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use jobboard_core::{AdminId, DomainError, JobId};
use jobboard_jobs::{Job, JobContent, QuotaIntent};

use super::{LazyExpiryEnforcer, QuotaEngine, ServiceError, ServiceResult};
use crate::audit::{AuditAction, AuditEntityType, AuditLogEntry, AuditRecorder};
use crate::store::{CompanyStore, JobFilter, JobStore};

/// Listing parameters. A company email scopes the listing and triggers the
/// expiry check for that company first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub company_email: Option<String>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct JobBoard {
    companies: Arc<dyn CompanyStore>,
    jobs: Arc<dyn JobStore>,
    quota: QuotaEngine,
    expiry: LazyExpiryEnforcer,
    audit: AuditRecorder,
}

impl JobBoard {
    pub fn new(
        companies: Arc<dyn CompanyStore>,
        jobs: Arc<dyn JobStore>,
        quota: QuotaEngine,
        expiry: LazyExpiryEnforcer,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            companies,
            jobs,
            quota,
            expiry,
            audit,
        }
    }

    pub async fn list(&self, query: &JobQuery, now: DateTime<Utc>) -> ServiceResult<Vec<Job>> {
        if let Some(email) = query.company_email.as_deref() {
            self.expiry.enforce(email, now).await;
        }
        let filter = JobFilter {
            company_email: query.company_email.clone(),
            active: query.active,
        };
        Ok(self.jobs.list(&filter).await?)
    }

    pub async fn get(&self, id: JobId) -> ServiceResult<Job> {
        self.jobs
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("job"))
    }

    pub async fn create(
        &self,
        owner_email: &str,
        content: JobContent,
        now: DateTime<Utc>,
    ) -> ServiceResult<Job> {
        let company = self
            .companies
            .find_by_email(owner_email)
            .await?
            .ok_or_else(|| ServiceError::not_found("company"))?;
        self.quota
            .can_create_or_activate(&company, QuotaIntent::Create, now)
            .await?;

        let job = Job::post(JobId::new(), &company, content, now)?;
        self.jobs.insert(&job).await?;
        self.quota.adjust_counter(company.email(), 1).await;

        info!(company = %company.email(), job_id = %job.id_typed(), "job posted");
        Ok(job)
    }

    /// Company toggle. Activation goes through the quota check and reports
    /// the specific refusal.
    pub async fn set_active(
        &self,
        owner_email: &str,
        id: JobId,
        active: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<Job> {
        let mut job = self.owned_job(owner_email, id).await?;
        if active {
            if !job.is_active() {
                let company = self
                    .companies
                    .find_by_email(owner_email)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("company"))?;
                self.quota
                    .can_create_or_activate(&company, QuotaIntent::Activate, now)
                    .await?;
                self.quota.record_activation(&mut job, now).await?;
            }
        } else {
            self.quota.record_deactivation(&mut job, now).await?;
        }
        Ok(job)
    }

    /// Administrator override. Skips the quota check but keeps the counter
    /// in step, and is audited.
    pub async fn admin_set_active(
        &self,
        admin: AdminId,
        id: JobId,
        active: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<Job> {
        let mut job = self.get(id).await?;
        let changed = if active {
            self.quota.record_activation(&mut job, now).await?
        } else {
            self.quota.record_deactivation(&mut job, now).await?
        };

        self.audit.record(AuditLogEntry::new(
            admin,
            AuditAction::OverrideJobStatus,
            AuditEntityType::Job,
            job.id_typed().to_string(),
            json!({
                "company_email": job.company_email(),
                "active": active,
                "changed": changed,
            }),
            now,
        ));
        Ok(job)
    }

    pub async fn update(
        &self,
        owner_email: &str,
        id: JobId,
        content: JobContent,
        now: DateTime<Utc>,
    ) -> ServiceResult<Job> {
        let mut job = self.owned_job(owner_email, id).await?;
        job.update_content(content, now)?;
        self.jobs.save(&job).await?;
        Ok(job)
    }

    pub async fn delete(&self, owner_email: &str, id: JobId) -> ServiceResult<()> {
        self.owned_job(owner_email, id).await?;
        let removed = self.jobs.delete(id).await?;
        if let Some(job) = removed {
            if job.is_active() {
                self.quota.adjust_counter(job.company_email(), -1).await;
            }
            info!(company = %job.company_email(), job_id = %id, "job deleted");
        }
        Ok(())
    }

    async fn owned_job(&self, owner_email: &str, id: JobId) -> ServiceResult<Job> {
        let job = self.get(id).await?;
        if !job.is_owned_by(owner_email) {
            return Err(DomainError::forbidden("job belongs to another company").into());
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jobboard_plans::{PlanId, SubscriptionWindow};

    use crate::services::testing::{Harness, test_time};
    use crate::store::AuditStore;

    fn board(h: &Harness) -> JobBoard {
        JobBoard::new(
            h.companies.clone(),
            h.jobs.clone(),
            QuotaEngine::new(h.companies.clone(), h.jobs.clone()),
            LazyExpiryEnforcer::new(h.companies.clone(), h.jobs.clone()),
            h.audit(),
        )
    }

    fn content(title: &str) -> JobContent {
        JobContent {
            title: title.to_string(),
            description: "Ship it".to_string(),
            ..JobContent::default()
        }
    }

    fn forbidden_message(err: ServiceError) -> String {
        match err {
            ServiceError::Domain(DomainError::Forbidden(msg)) => msg,
            other => panic!("Expected forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fourth_job_on_free_plan_is_refused() {
        let h = Harness::new();
        let board = board(&h);
        h.approved_company("jobs@vandelay.com", "vandelay").await;

        for i in 0..3 {
            board
                .create("jobs@vandelay.com", content(&format!("Importer {i}")), test_time())
                .await
                .unwrap();
        }
        assert_eq!(
            h.company("jobs@vandelay.com").await.cached_active_job_count(),
            Some(3)
        );

        let err = board
            .create("jobs@vandelay.com", content("Exporter"), test_time())
            .await
            .unwrap_err();
        assert!(forbidden_message(err).contains("job limit reached"));
    }

    #[tokio::test]
    async fn cold_counter_with_existing_jobs_still_enforces_limit() {
        let h = Harness::new();
        let board = board(&h);
        let company = h.approved_company("jobs@vandelay.com", "vandelay").await;
        h.seed_job(&company, "Legacy 1", test_time()).await;
        h.seed_job(&company, "Legacy 2", test_time()).await;

        board
            .create("jobs@vandelay.com", content("Importer"), test_time())
            .await
            .unwrap();
        assert_eq!(
            h.company("jobs@vandelay.com").await.cached_active_job_count(),
            Some(3)
        );

        let err = board
            .create("jobs@vandelay.com", content("Exporter"), test_time())
            .await
            .unwrap_err();
        assert!(forbidden_message(err).contains("job limit reached"));
        assert_eq!(h.jobs.count_active("jobs@vandelay.com").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn admin_override_on_cold_counter_recounts() {
        let h = Harness::new();
        let board = board(&h);
        let company = h.approved_company("jobs@vandelay.com", "vandelay").await;
        h.seed_job(&company, "Legacy 1", test_time()).await;
        let mut extra = h.seed_job(&company, "Legacy 2", test_time()).await;
        extra.deactivate(test_time());
        h.jobs.save(&extra).await.unwrap();

        board
            .admin_set_active(AdminId::new(), extra.id_typed(), true, test_time())
            .await
            .unwrap();
        assert_eq!(
            h.company("jobs@vandelay.com").await.cached_active_job_count(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn held_company_cannot_post() {
        let h = Harness::new();
        let board = board(&h);
        let mut company = h.approved_company("jobs@vandelay.com", "vandelay").await;
        company.hold("verify GST number", test_time()).unwrap();
        h.companies.save(&company).await.unwrap();

        let err = board
            .create("jobs@vandelay.com", content("Importer"), test_time())
            .await
            .unwrap_err();
        assert_eq!(forbidden_message(err), "account on hold, cannot post jobs");
    }

    #[tokio::test]
    async fn toggling_reports_specific_refusal_and_checks_ownership() {
        let h = Harness::new();
        let board = board(&h);
        h.approved_company("jobs@vandelay.com", "vandelay").await;
        h.approved_company("jobs@kramerica.com", "kramerica").await;

        let job = board
            .create("jobs@vandelay.com", content("Importer"), test_time())
            .await
            .unwrap();
        let err = board
            .set_active("jobs@kramerica.com", job.id_typed(), false, test_time())
            .await
            .unwrap_err();
        assert!(forbidden_message(err).contains("another company"));

        let job = board
            .set_active("jobs@vandelay.com", job.id_typed(), false, test_time())
            .await
            .unwrap();
        assert!(!job.is_active());

        // Expire a paid plan without running the enforcer.
        let mut company = h.company("jobs@vandelay.com").await;
        let plan = PlanId::Paid3m.plan();
        let start = test_time() - Duration::days(91);
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), start);
        h.companies.save(&company).await.unwrap();

        let err = board
            .set_active("jobs@vandelay.com", job.id_typed(), true, test_time())
            .await
            .unwrap_err();
        assert_eq!(forbidden_message(err), "subscription expired, cannot activate");
    }

    #[tokio::test]
    async fn company_listing_runs_expiry_first() {
        let h = Harness::new();
        let board = board(&h);
        let mut company = h.approved_company("jobs@vandelay.com", "vandelay").await;
        let plan = PlanId::Paid12m.plan();
        let start = test_time() - Duration::days(400);
        company.apply_subscription(plan, SubscriptionWindow::for_plan(start, plan), start);
        h.companies.save(&company).await.unwrap();
        for i in 0..4 {
            h.seed_job(&company, &format!("Role {i}"), start + Duration::days(i))
                .await;
        }

        let listed = board
            .list(
                &JobQuery {
                    company_email: Some("jobs@vandelay.com".to_string()),
                    active: None,
                },
                test_time(),
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 4);
        assert!(listed.iter().all(|job| !job.is_active()));
        assert_eq!(
            h.company("jobs@vandelay.com").await.subscription().plan_id,
            PlanId::Free
        );
    }

    #[tokio::test]
    async fn admin_override_bypasses_quota_and_is_audited() {
        let h = Harness::new();
        let board = board(&h);
        let company = h.approved_company("jobs@vandelay.com", "vandelay").await;
        let mut extra = h.seed_job(&company, "Extra", test_time()).await;
        for i in 0..3 {
            h.seed_job(&company, &format!("Role {i}"), test_time()).await;
        }
        extra.deactivate(test_time());
        h.jobs.save(&extra).await.unwrap();

        let job = board
            .admin_set_active(AdminId::new(), extra.id_typed(), true, test_time())
            .await
            .unwrap();
        assert!(job.is_active());
        h.settle().await;

        let entries = h.audit_store.list(5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::OverrideJobStatus);
        assert_eq!(entries[0].details["changed"], true);
    }

    #[tokio::test]
    async fn deleting_an_active_job_frees_a_slot() {
        let h = Harness::new();
        let board = board(&h);
        h.approved_company("jobs@vandelay.com", "vandelay").await;
        let mut ids = Vec::new();
        for i in 0..3 {
            let job = board
                .create("jobs@vandelay.com", content(&format!("Role {i}")), test_time())
                .await
                .unwrap();
            ids.push(job.id_typed());
        }

        board.delete("jobs@vandelay.com", ids[0]).await.unwrap();
        assert_eq!(
            h.company("jobs@vandelay.com").await.cached_active_job_count(),
            Some(2)
        );
        board
            .create("jobs@vandelay.com", content("Replacement"), test_time())
            .await
            .unwrap();
        assert!(matches!(
            board.get(ids[0]).await.unwrap_err(),
            ServiceError::Domain(DomainError::NotFound(_))
        ));
    }
}
