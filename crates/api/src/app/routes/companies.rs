use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use jobboard_core::DomainError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

/// Company self-service, mounted under `/companies/me`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(get_me))
        .route("/messages", get(list_messages).post(post_message))
}

pub async fn register_company(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterCompanyRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    match services.lifecycle.register(body.into(), now).await {
        Ok(company) => {
            (StatusCode::CREATED, Json(dto::company_to_json(&company, now))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Profile plus whether the account may sign in. A denied or pending
/// account still gets its profile so the frontend can explain why.
pub async fn get_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let now = Utc::now();

    let company = match services.lifecycle.find_by_email(&email).await {
        Ok(company) => company,
        Err(e) => return errors::service_error_to_response(e),
    };
    let login = match company.login_gate() {
        Ok(()) => json!({ "allowed": true, "reason": null }),
        Err(DomainError::Forbidden(reason)) => json!({ "allowed": false, "reason": reason }),
        Err(e) => return errors::domain_error_to_response(e),
    };

    let mut body = dto::company_to_json(&company, now);
    body["login"] = login;
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn list_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };

    match services.lifecycle.messages(&email, query.page, query.limit).await {
        Ok(page) => (StatusCode::OK, Json(dto::message_page_to_json(&page))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn post_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::MessageRequest>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };

    match services
        .lifecycle
        .company_post_message(&email, &body.text, Utc::now())
        .await
    {
        Ok(message) => (StatusCode::CREATED, Json(dto::message_to_json(&message))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
