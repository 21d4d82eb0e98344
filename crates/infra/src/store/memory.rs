//! In-memory stores for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use jobboard_companies::Company;
use jobboard_core::{CompanyId, Entity, JobId};
use jobboard_jobs::Job;

use super::{
    AuditStore, CompanyFilter, CompanyStore, JobFilter, JobStore, StoreError, StoreResult,
    email_key,
};
use crate::audit::AuditLogEntry;

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryCompanyStore {
    inner: RwLock<HashMap<CompanyId, Company>>,
}

impl InMemoryCompanyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompanyStore for InMemoryCompanyStore {
    async fn insert(&self, company: &Company) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let email = email_key(company.email());
        let handle = company.handle().to_lowercase();
        for existing in map.values() {
            if email_key(existing.email()) == email {
                return Err(StoreError::Conflict(format!("email '{email}' is taken")));
            }
            if existing.handle().to_lowercase() == handle {
                return Err(StoreError::Conflict(format!(
                    "handle '{}' is taken",
                    company.handle()
                )));
            }
        }
        map.insert(*company.id(), company.clone());
        Ok(())
    }

    async fn get(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Company>> {
        let key = email_key(email);
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|c| email_key(c.email()) == key).cloned())
    }

    async fn save(&self, company: &Company) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let existing = map
            .get(&company.id_typed())
            .ok_or_else(|| StoreError::NotFound("company".to_string()))?;

        let mut next = company.clone();
        if let Some(count) = existing.cached_active_job_count() {
            next.set_cached_active_job_count(count);
        }
        map.insert(*next.id(), next);
        Ok(())
    }

    async fn list(&self, filter: &CompanyFilter) -> StoreResult<Vec<Company>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut companies: Vec<Company> =
            map.values().filter(|c| filter.matches(c)).cloned().collect();
        companies.sort_by_key(|c| (c.created_at(), c.id_typed()));
        Ok(companies)
    }

    async fn adjust_active_job_count(&self, email: &str, delta: i64) -> StoreResult<u32> {
        let key = email_key(email);
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let company = map
            .values_mut()
            .find(|c| email_key(c.email()) == key)
            .ok_or_else(|| StoreError::NotFound("company".to_string()))?;

        let current = i64::from(company.cached_active_job_count().unwrap_or(0));
        let next = u32::try_from((current + delta).max(0)).unwrap_or(u32::MAX);
        company.set_cached_active_job_count(next);
        Ok(next)
    }

    async fn set_active_job_count(&self, email: &str, count: u32) -> StoreResult<()> {
        let key = email_key(email);
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let company = map
            .values_mut()
            .find(|c| email_key(c.email()) == key)
            .ok_or_else(|| StoreError::NotFound("company".to_string()))?;
        company.set_cached_active_job_count(count);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&job.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "job {} already exists",
                job.id_typed()
            )));
        }
        map.insert(*job.id(), job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> StoreResult<Option<Job>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn save(&self, job: &Job) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if !map.contains_key(&job.id_typed()) {
            return Err(StoreError::NotFound("job".to_string()));
        }
        map.insert(*job.id(), job.clone());
        Ok(())
    }

    async fn delete(&self, id: JobId) -> StoreResult<Option<Job>> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(&id))
    }

    async fn list(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut jobs: Vec<Job> = map.values().filter(|j| filter.matches(j)).cloned().collect();
        jobs.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(jobs)
    }

    async fn count_active(&self, company_email: &str) -> StoreResult<u32> {
        let filter = JobFilter::active_for(company_email);
        let map = self.inner.read().map_err(|_| poisoned())?;
        let count = map.values().filter(|j| filter.matches(j)).count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn deactivate(&self, ids: &[JobId], now: DateTime<Utc>) -> StoreResult<u64> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut changed = 0;
        for id in ids {
            if let Some(job) = map.get_mut(id) {
                if job.deactivate(now) {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn deactivate_all_for_company(
        &self,
        company_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut changed = 0;
        for job in map.values_mut().filter(|j| j.is_owned_by(company_email)) {
            if job.deactivate(now) {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    inner: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        let mut entries = self.inner.write().map_err(|_| poisoned())?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn list(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        let entries = self.inner.read().map_err(|_| poisoned())?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
