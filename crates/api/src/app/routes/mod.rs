use axum::{
    routing::{get, patch, post},
    Router,
};

pub mod admin;
pub mod companies;
pub mod jobs;
pub mod payments;
pub mod plans;
pub mod system;

/// Endpoints reachable without a token: catalog, registration, public job
/// browsing and the provider webhook.
pub fn public_router() -> Router {
    Router::new()
        .route("/plans", get(plans::list_plans))
        .route("/companies", post(companies::register_company))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/payments/config", get(payments::payment_config))
        .route("/payments/webhook", post(payments::webhook))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/companies/me", companies::router())
        .route("/jobs", post(jobs::create_job))
        .route("/jobs/:id", patch(jobs::update_job).delete(jobs::delete_job))
        .route("/jobs/:id/active", patch(jobs::set_job_active))
        .route("/payments/order", post(payments::create_order))
        .route("/payments/verify", post(payments::verify_payment))
        .nest("/admin", admin::router())
}
