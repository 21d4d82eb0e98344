use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use jobboard_companies::{Company, CompanyMessage, NewCompany, Subscription};
use jobboard_infra::AuditLogEntry;
use jobboard_infra::services::{MessagePage, SweepReport};
use jobboard_jobs::{Job, JobContent};
use jobboard_plans::Plan;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterCompanyRequest {
    pub email: String,
    pub handle: String,
    pub display_name: String,
    pub contact_name: Option<String>,
}

impl From<RegisterCompanyRequest> for NewCompany {
    fn from(body: RegisterCompanyRequest) -> Self {
        NewCompany {
            email: body.email,
            handle: body.handle,
            display_name: body.display_name,
            contact_name: body.contact_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobContentRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl From<JobContentRequest> for JobContent {
    fn from(body: JobContentRequest) -> Self {
        JobContent {
            title: body.title,
            description: body.description,
            location: body.location,
            employment_type: body.employment_type,
            salary: body.salary,
            attachments: body.attachments,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub plan: String,
}

/// Fields posted back by the checkout widget.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    pub plan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub email: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanyListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn plan_to_json(plan: &Plan) -> serde_json::Value {
    json!({
        "id": plan.id.as_str(),
        "label": plan.label,
        "duration_days": plan.duration_days,
        "job_limit": plan.job_limit,
        "ads_enabled": plan.ads_enabled,
        "recommendations_enabled": plan.recommendations_enabled,
        "price_minor": plan.price_minor,
        "currency": plan.currency,
    })
}

pub fn subscription_to_json(sub: &Subscription, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "plan_id": sub.plan_id.as_str(),
        "started_at": sub.started_at,
        "ends_at": sub.ends_at,
        "job_limit": sub.job_limit,
        "days_remaining": sub.days_remaining(now),
        "downgraded_from_plan": sub.downgraded_from_plan.map(|p| p.as_str()),
    })
}

pub fn company_to_json(company: &Company, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "id": company.id_typed().to_string(),
        "email": company.email(),
        "handle": company.handle(),
        "display_name": company.display_name(),
        "contact_name": company.contact_name(),
        "status": company.status().as_str(),
        "approved": company.approved(),
        "subscription": subscription_to_json(company.subscription(), now),
        "active_job_count": company.cached_active_job_count(),
        "created_at": company.created_at(),
        "updated_at": company.updated_at(),
    })
}

pub fn message_to_json(message: &CompanyMessage) -> serde_json::Value {
    json!({
        "kind": message.kind,
        "from": message.from,
        "text": message.text,
        "created_at": message.created_at,
    })
}

pub fn message_page_to_json(page: &MessagePage) -> serde_json::Value {
    json!({
        "items": page.items.iter().map(message_to_json).collect::<Vec<_>>(),
        "page": page.page,
        "limit": page.limit,
        "total": page.total,
    })
}

pub fn job_to_json(job: &Job) -> serde_json::Value {
    let content = job.content();
    json!({
        "id": job.id_typed().to_string(),
        "company_email": job.company_email(),
        "company_name": job.company_name(),
        "title": content.title,
        "description": content.description,
        "location": content.location,
        "employment_type": content.employment_type,
        "salary": content.salary,
        "attachments": content.attachments,
        "active": job.is_active(),
        "status": job.status().as_str(),
        "created_at": job.created_at(),
        "updated_at": job.updated_at(),
    })
}

pub fn audit_entry_to_json(entry: &AuditLogEntry) -> serde_json::Value {
    json!({
        "id": entry.id.to_string(),
        "admin_id": entry.admin_id.to_string(),
        "action": entry.action.as_str(),
        "entity_type": entry.entity_type.as_str(),
        "entity_id": entry.entity_id,
        "details": entry.details,
        "timestamp": entry.timestamp,
    })
}

pub fn sweep_report_to_json(report: &SweepReport) -> serde_json::Value {
    json!({
        "scanned": report.scanned,
        "reminders_sent": report.reminders_sent,
        "expiry_notices_sent": report.expiry_notices_sent,
        "downgraded": report.downgraded,
        "jobs_deactivated": report.jobs_deactivated,
        "counters_healed": report.counters_healed,
        "failures": report.failures,
    })
}
