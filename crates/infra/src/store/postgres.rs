//! Postgres-backed stores.
//!
//! Subscription snapshots, message logs and job content are JSONB columns.
//! Schema lives in `migrations/`; run it with [`migrate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use jobboard_companies::{ApprovalStatus, Company, CompanyMessage, CompanyRecord, Subscription};
use jobboard_core::{AdminId, AuditEntryId, CompanyId, JobId};
use jobboard_jobs::{Job, JobContent, JobRecord};

use super::{
    AuditStore, CompanyFilter, CompanyStore, JobFilter, JobStore, StoreError, StoreResult,
    email_key,
};
use crate::audit::{AuditAction, AuditEntityType, AuditLogEntry};

/// Apply the bundled migrations.
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
}

fn map_err(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

fn to_i32(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Status as [`Company::restore`] reads it: legacy rows flagged `approved`
/// with a pending or missing status count as approved.
const EFFECTIVE_STATUS: &str = "(CASE WHEN approved AND (status IS NULL OR status = 'pending') \
     THEN 'approved' ELSE COALESCE(status, 'pending') END)";

const COMPANY_COLUMNS: &str = "id, email, handle, display_name, contact_name, status, approved, \
     subscription, active_job_count, messages, last_expiry_notice_sent, created_at, updated_at";

fn company_from_row(row: &PgRow) -> sqlx::Result<Company> {
    let status: Option<String> = row.try_get("status")?;
    let active_job_count: Option<i32> = row.try_get("active_job_count")?;
    Ok(Company::restore(CompanyRecord {
        id: CompanyId::from_uuid(row.try_get("id")?),
        email: row.try_get("email")?,
        handle: row.try_get("handle")?,
        display_name: row.try_get("display_name")?,
        contact_name: row.try_get("contact_name")?,
        status: status.and_then(|s| ApprovalStatus::parse(&s).ok()),
        approved: row.try_get("approved")?,
        subscription: row.try_get::<Json<Subscription>, _>("subscription")?.0,
        active_job_count: active_job_count.map(|c| u32::try_from(c).unwrap_or(0)),
        messages: row.try_get::<Json<Vec<CompanyMessage>>, _>("messages")?.0,
        last_expiry_notice_sent: row.try_get("last_expiry_notice_sent")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

#[derive(Debug, Clone)]
pub struct PostgresCompanyStore {
    pool: PgPool,
}

impl PostgresCompanyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyStore for PostgresCompanyStore {
    async fn insert(&self, company: &Company) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO companies (
                id, email, handle, display_name, contact_name, status, approved,
                subscription, active_job_count, messages, last_expiry_notice_sent,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(company.id_typed().as_uuid())
        .bind(email_key(company.email()))
        .bind(company.handle())
        .bind(company.display_name())
        .bind(company.contact_name())
        .bind(company.status().as_str())
        .bind(company.approved())
        .bind(Json(company.subscription()))
        .bind(company.cached_active_job_count().map(to_i32))
        .bind(Json(company.messages()))
        .bind(company.last_expiry_notice_sent())
        .bind(company.created_at())
        .bind(company.updated_at())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(map_err)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email_key(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(map_err)
    }

    async fn save(&self, company: &Company) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE companies SET
                email = $2,
                handle = $3,
                display_name = $4,
                contact_name = $5,
                status = $6,
                approved = $7,
                subscription = $8,
                messages = $9,
                last_expiry_notice_sent = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(company.id_typed().as_uuid())
        .bind(email_key(company.email()))
        .bind(company.handle())
        .bind(company.display_name())
        .bind(company.contact_name())
        .bind(company.status().as_str())
        .bind(company.approved())
        .bind(Json(company.subscription()))
        .bind(Json(company.messages()))
        .bind(company.last_expiry_notice_sent())
        .bind(company.updated_at())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("company".to_string()));
        }
        Ok(())
    }

    async fn list(&self, filter: &CompanyFilter) -> StoreResult<Vec<Company>> {
        let sql = format!(
            r#"
            SELECT {COMPANY_COLUMNS} FROM companies
            WHERE ($1::text IS NULL OR {EFFECTIVE_STATUS} = $1)
              AND ($2::text IS NULL
                   OR email ILIKE '%' || $2 || '%'
                   OR handle ILIKE '%' || $2 || '%'
                   OR display_name ILIKE '%' || $2 || '%')
              AND (NOT $3
                   OR (subscription->>'plan_id' <> 'free'
                       AND subscription->>'ends_at' IS NOT NULL))
            ORDER BY created_at ASC, id ASC
            "#
        );
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(search)
            .bind(filter.expiring_paid_only)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        let companies = rows
            .iter()
            .map(company_from_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(map_err)?;

        Ok(companies.into_iter().filter(|c| filter.matches(c)).collect())
    }

    async fn adjust_active_job_count(&self, email: &str, delta: i64) -> StoreResult<u32> {
        let delta = i32::try_from(delta).unwrap_or(if delta < 0 { i32::MIN } else { i32::MAX });
        let row = sqlx::query(
            r#"
            UPDATE companies
            SET active_job_count = GREATEST(0, COALESCE(active_job_count, 0) + $2)
            WHERE email = $1
            RETURNING active_job_count
            "#,
        )
        .bind(email_key(email))
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?
        .ok_or_else(|| StoreError::NotFound("company".to_string()))?;

        let count: i32 = row.try_get("active_job_count").map_err(map_err)?;
        Ok(u32::try_from(count).unwrap_or(0))
    }

    async fn set_active_job_count(&self, email: &str, count: u32) -> StoreResult<()> {
        let result = sqlx::query("UPDATE companies SET active_job_count = $2 WHERE email = $1")
            .bind(email_key(email))
            .bind(to_i32(count))
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("company".to_string()));
        }
        Ok(())
    }
}

const JOB_COLUMNS: &str =
    "id, company_email, company_name, content, active, status, created_at, updated_at";

fn job_from_row(row: &PgRow) -> sqlx::Result<Job> {
    Ok(Job::restore(JobRecord {
        id: JobId::from_uuid(row.try_get("id")?),
        company_email: row.try_get("company_email")?,
        company_name: row.try_get("company_name")?,
        content: row.try_get::<Json<JobContent>, _>("content")?.0,
        active: row.try_get("active")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn insert(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, company_email, company_name, content, active, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(job.id_typed().as_uuid())
        .bind(email_key(job.company_email()))
        .bind(job.company_name())
        .bind(Json(job.content()))
        .bind(job.is_active())
        .bind(job.status().as_str())
        .bind(job.created_at())
        .bind(job.updated_at())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> StoreResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(job_from_row).transpose().map_err(map_err)
    }

    async fn save(&self, job: &Job) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                company_name = $2,
                content = $3,
                active = $4,
                status = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(job.id_typed().as_uuid())
        .bind(job.company_name())
        .bind(Json(job.content()))
        .bind(job.is_active())
        .bind(job.status().as_str())
        .bind(job.updated_at())
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("job".to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: JobId) -> StoreResult<Option<Job>> {
        let sql = format!("DELETE FROM jobs WHERE id = $1 RETURNING {JOB_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(job_from_row).transpose().map_err(map_err)
    }

    async fn list(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        // Rows without an `active` flag fall back to the legacy status string.
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE ($1::text IS NULL OR company_email = $1)
              AND ($2::bool IS NULL
                   OR COALESCE(active, status IS NULL OR LOWER(TRIM(status)) = 'active') = $2)
            ORDER BY created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.company_email.as_deref().map(email_key))
            .bind(filter.active)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter()
            .map(job_from_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(map_err)
    }

    async fn count_active(&self, company_email: &str) -> StoreResult<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS active FROM jobs
            WHERE company_email = $1
              AND COALESCE(active, status IS NULL OR LOWER(TRIM(status)) = 'active')
            "#,
        )
        .bind(email_key(company_email))
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        let count: i64 = row.try_get("active").map_err(map_err)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn deactivate(&self, ids: &[JobId], now: DateTime<Utc>) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            UPDATE jobs SET active = FALSE, status = 'inactive', updated_at = $2
            WHERE id = ANY($1)
              AND COALESCE(active, status IS NULL OR LOWER(TRIM(status)) = 'active')
            "#,
        )
        .bind(&ids)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        debug!(requested = ids.len(), deactivated = result.rows_affected(), "jobs deactivated");
        Ok(result.rows_affected())
    }

    async fn deactivate_all_for_company(
        &self,
        company_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET active = FALSE, status = 'inactive', updated_at = $2
            WHERE company_email = $1
              AND COALESCE(active, status IS NULL OR LOWER(TRIM(status)) = 'active')
            "#,
        )
        .bind(email_key(company_email))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, admin_id, action, entity_type, entity_id, details, "timestamp")
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.admin_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(&entry.entity_id)
        .bind(Json(&entry.details))
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn list(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, admin_id, action, entity_type, entity_id, details, "timestamp"
            FROM audit_log
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let action: String = row.try_get("action").map_err(map_err)?;
            let entity_type: String = row.try_get("entity_type").map_err(map_err)?;
            let (Some(action), Some(entity_type)) =
                (AuditAction::parse(&action), AuditEntityType::parse(&entity_type))
            else {
                debug!(%action, %entity_type, "skipping audit row with unknown kind");
                continue;
            };
            entries.push(AuditLogEntry {
                id: AuditEntryId::from_uuid(row.try_get("id").map_err(map_err)?),
                admin_id: AdminId::from_uuid(row.try_get("admin_id").map_err(map_err)?),
                action,
                entity_type,
                entity_id: row.try_get("entity_id").map_err(map_err)?,
                details: row
                    .try_get::<Json<serde_json::Value>, _>("details")
                    .map_err(map_err)?
                    .0,
                timestamp: row.try_get("timestamp").map_err(map_err)?,
            });
        }
        Ok(entries)
    }
}
