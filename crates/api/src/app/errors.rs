use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use jobboard_core::DomainError;
use jobboard_infra::ServiceError;
use jobboard_infra::store::StoreError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(StoreError::NotFound(what)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        ServiceError::Store(StoreError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        ServiceError::Store(e) => {
            error!(error = %e, "persistence failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
        ServiceError::Provider(e) => {
            error!(error = %e, "payment provider failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment_provider_error",
                "could not create payment order",
            )
        }
        ServiceError::NotConfigured(what) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "not_configured",
            format!("{what} not configured"),
        ),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let code = err.code();
    match err {
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, code, msg)
        }
        DomainError::InvalidPlan(plan) => {
            json_error(StatusCode::BAD_REQUEST, code, format!("invalid plan '{plan}'"))
        }
        DomainError::InvalidSignature => {
            json_error(StatusCode::BAD_REQUEST, code, "invalid signature")
        }
        DomainError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, code, format!("{what} not found"))
        }
        DomainError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, code, msg),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path id, answering 400 on malformed input.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}
