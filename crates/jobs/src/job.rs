use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobboard_companies::Company;
use jobboard_core::{DomainError, DomainResult, Entity, JobId};

/// Legacy status string mirrored from the `active` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Inactive,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Inactive => "inactive",
        }
    }

    fn from_active(active: bool) -> Self {
        if active {
            JobStatus::Active
        } else {
            JobStatus::Inactive
        }
    }
}

/// Editable posting content. Attachments are stored as URLs only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobContent {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl JobContent {
    fn validated(mut self) -> DomainResult<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(DomainError::validation("job title is required"));
        }
        Ok(self)
    }
}

/// Stored shape of a job.
///
/// Older rows may lack the `active` flag; it is derived from `status` then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: JobId,
    pub company_email: String,
    pub company_name: String,
    pub content: JobContent,
    pub active: Option<bool>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity: a job posting owned by one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    id: JobId,
    company_email: String,
    company_name: String,
    #[serde(flatten)]
    content: JobContent,
    active: bool,
    status: JobStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new, active posting for `company`.
    ///
    /// Quota checks happen before this is called.
    pub fn post(
        id: JobId,
        company: &Company,
        content: JobContent,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            company_email: company.email().to_string(),
            company_name: company.display_name().to_string(),
            content: content.validated()?,
            active: true,
            status: JobStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn restore(record: JobRecord) -> Self {
        let active = record.active.unwrap_or_else(|| {
            record
                .status
                .as_deref()
                .is_none_or(|status| status.trim().eq_ignore_ascii_case("active"))
        });
        Self {
            id: record.id,
            company_email: record.company_email,
            company_name: record.company_name,
            content: record.content,
            active,
            status: JobStatus::from_active(active),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn id_typed(&self) -> JobId {
        self.id
    }

    pub fn company_email(&self) -> &str {
        &self.company_email
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn content(&self) -> &JobContent {
        &self.content
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_owned_by(&self, email: &str) -> bool {
        self.company_email.eq_ignore_ascii_case(email.trim())
    }

    /// Returns `true` if the job was inactive before.
    pub fn activate(&mut self, now: DateTime<Utc>) -> bool {
        self.set_active(true, now)
    }

    /// Returns `true` if the job was active before.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        self.set_active(false, now)
    }

    pub fn update_content(&mut self, content: JobContent, now: DateTime<Utc>) -> DomainResult<()> {
        self.content = content.validated()?;
        self.updated_at = now;
        Ok(())
    }

    fn set_active(&mut self, active: bool, now: DateTime<Utc>) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        self.status = JobStatus::from_active(active);
        self.updated_at = now;
        true
    }
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
