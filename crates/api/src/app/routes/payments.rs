//! Checkout endpoints. Field names follow the checkout widget's contract.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use jobboard_infra::services::{ActivationOutcome, CallbackVerification, OrderOutcome};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub async fn payment_config(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "keyId": services.payments.key_id() }))).into_response()
}

/// Start a checkout for the calling company. The free plan is activated
/// immediately and no order is created.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let now = Utc::now();

    match services.payments.create_order(&email, &body.plan, now).await {
        Ok(OrderOutcome::Created {
            order,
            email,
            plan_id,
            key_id,
        }) => (
            StatusCode::OK,
            Json(json!({
                "orderId": order.order_id,
                "amount": order.amount,
                "currency": order.currency,
                "email": email,
                "plan": plan_id.as_str(),
                "keyId": key_id,
            })),
        )
            .into_response(),
        Ok(OrderOutcome::Activated(outcome)) => activation_response(&outcome, now),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Browser confirmation after checkout. Without a plan the signature is
/// only verified.
pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::VerifyPaymentRequest>,
) -> axum::response::Response {
    let email = match authz::require_company(&principal) {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let callback = CallbackVerification {
        order_id: body.razorpay_order_id,
        payment_id: body.razorpay_payment_id,
        signature: body.razorpay_signature,
    };
    let now = Utc::now();

    match services
        .payments
        .verify_client_callback(&callback, &email, body.plan.as_deref(), now)
        .await
    {
        Ok(Some(outcome)) => activation_response(&outcome, now),
        Ok(None) => {
            (StatusCode::OK, Json(json!({ "verified": true, "activated": false }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Provider webhook. The signature covers the raw body, so it is read
/// as bytes before any JSON parsing.
pub async fn webhook(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match services
        .payments
        .handle_webhook(&body, signature, Utc::now())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn activation_response(
    outcome: &ActivationOutcome,
    now: chrono::DateTime<Utc>,
) -> axum::response::Response {
    let company = outcome.company();
    (
        StatusCode::OK,
        Json(json!({
            "verified": true,
            "activated": matches!(outcome, ActivationOutcome::Activated(_)),
            "email": company.email(),
            "plan": company.subscription().plan_id.as_str(),
            "subscription": dto::subscription_to_json(company.subscription(), now),
        })),
    )
        .into_response()
}
