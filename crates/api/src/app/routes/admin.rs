//! Administrator endpoints: company review, messaging, job overrides, the
//! audit trail and the manual subscription sweep.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use jobboard_auth::Permission;
use jobboard_companies::ApprovalStatus;
use jobboard_core::{CompanyId, JobId};
use jobboard_infra::{AuditAction, AuditEntityType, AuditLogEntry, ServiceError};
use jobboard_infra::store::CompanyFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 500;

pub fn router() -> Router {
    Router::new()
        .route("/companies", get(list_companies))
        .route("/companies/:id", get(get_company))
        .route("/companies/:id/approve", post(approve_company))
        .route("/companies/:id/hold", post(hold_company))
        .route("/companies/:id/deny", post(deny_company))
        .route("/companies/:id/revoke", post(revoke_company))
        .route(
            "/companies/:id/messages",
            get(list_company_messages).post(message_company),
        )
        .route("/jobs/:id/active", patch(override_job_active))
        .route("/audit", get(list_audit))
        .route("/subscriptions/sweep", post(run_sweep))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

pub async fn list_companies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::CompanyListQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::COMPANIES_REVIEW) {
        return resp;
    }
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match ApprovalStatus::parse(raw) {
            Ok(status) => Some(status),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => None,
    };
    let filter = CompanyFilter {
        status,
        search: query.q.filter(|q| !q.trim().is_empty()),
        expiring_paid_only: false,
    };

    let now = Utc::now();
    match services.lifecycle.list(&filter).await {
        Ok(companies) => {
            let items = companies
                .iter()
                .map(|c| dto::company_to_json(c, now))
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::COMPANIES_REVIEW) {
        return resp;
    }
    let id: CompanyId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.lifecycle.get(id).await {
        Ok(company) => {
            (StatusCode::OK, Json(dto::company_to_json(&company, Utc::now()))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn approve_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match review_target(&principal, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let now = Utc::now();

    match services.lifecycle.approve(principal.admin_id(), id, now).await {
        Ok(company) => (StatusCode::OK, Json(dto::company_to_json(&company, now))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn hold_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReasonRequest>,
) -> axum::response::Response {
    let id = match review_target(&principal, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let now = Utc::now();

    match services
        .lifecycle
        .hold(principal.admin_id(), id, &body.reason, now)
        .await
    {
        Ok(company) => (StatusCode::OK, Json(dto::company_to_json(&company, now))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn deny_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReasonRequest>,
) -> axum::response::Response {
    let id = match review_target(&principal, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let now = Utc::now();

    match services
        .lifecycle
        .deny(principal.admin_id(), id, &body.reason, now)
        .await
    {
        Ok(company) => (StatusCode::OK, Json(dto::company_to_json(&company, now))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn revoke_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RevokeRequest>>,
) -> axum::response::Response {
    let id = match review_target(&principal, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let reason = body.and_then(|Json(b)| b.reason);
    let now = Utc::now();

    match services
        .lifecycle
        .revoke_access(principal.admin_id(), id, reason.as_deref(), now)
        .await
    {
        Ok(company) => (StatusCode::OK, Json(dto::company_to_json(&company, now))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_company_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::COMPANIES_MESSAGE) {
        return resp;
    }
    let id: CompanyId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.lifecycle.messages_for(id, query.page, query.limit).await {
        Ok(page) => (StatusCode::OK, Json(dto::message_page_to_json(&page))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn message_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MessageRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::COMPANIES_MESSAGE) {
        return resp;
    }
    let id: CompanyId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .lifecycle
        .message_company(principal.admin_id(), id, &body.text, Utc::now())
        .await
    {
        Ok(message) => (StatusCode::CREATED, Json(dto::message_to_json(&message))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Force a job on or off regardless of the owner's quota.
pub async fn override_job_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetActiveRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::JOBS_OVERRIDE) {
        return resp;
    }
    let id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .jobs
        .admin_set_active(principal.admin_id(), id, body.active, Utc::now())
        .await
    {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<AuditQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::AUDIT_READ) {
        return resp;
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);

    match services.audit.recent(limit).await {
        Ok(entries) => {
            let items = entries.iter().map(dto::audit_entry_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(ServiceError::Store(e)),
    }
}

/// Run the same sweep as the `check-subscriptions` binary.
pub async fn run_sweep(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::SUBSCRIPTIONS_SWEEP) {
        return resp;
    }

    let now = Utc::now();
    match services.sweeper.run(now).await {
        Ok(report) => {
            let summary = dto::sweep_report_to_json(&report);
            services.audit.record(AuditLogEntry::new(
                principal.admin_id(),
                AuditAction::TriggerSubscriptionSweep,
                AuditEntityType::System,
                "subscriptions",
                summary.clone(),
                now,
            ));
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

fn review_target(
    principal: &PrincipalContext,
    raw_id: &str,
) -> Result<CompanyId, axum::response::Response> {
    authz::require(principal, &Permission::COMPANIES_REVIEW)?;
    errors::parse_id(raw_id)
}
