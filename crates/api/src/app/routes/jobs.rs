use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use jobboard_core::JobId;
use jobboard_infra::services::JobQuery;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

/// Public listing. With `email`, the company's subscription is checked for
/// expiry before its jobs are read.
pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::JobListQuery>,
) -> axum::response::Response {
    let query = JobQuery {
        company_email: query.email.filter(|e| !e.trim().is_empty()),
        active: query.active,
    };

    match services.jobs.list(&query, Utc::now()).await {
        Ok(jobs) => {
            let items = jobs.iter().map(dto::job_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.get(id).await {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::JobContentRequest>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };

    match services.jobs.create(&email, body.into(), Utc::now()).await {
        Ok(job) => (StatusCode::CREATED, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::JobContentRequest>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.update(&email, id, body.into(), Utc::now()).await {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.delete(&email, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Company toggle. A refused activation answers 403 with the specific
/// reason (expired, limit reached, account on hold).
pub async fn set_job_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetActiveRequest>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .jobs
        .set_active(&email, id, body.active, Utc::now())
        .await
    {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
