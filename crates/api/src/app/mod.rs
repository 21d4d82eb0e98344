//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use jobboard_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(router_with_services(&config.jwt_secret, services))
}

/// Assemble the router around already-wired services.
pub fn router_with_services(jwt_secret: &str, services: services::AppServices) -> Router {
    let jwt = Arc::new(jobboard_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .merge(protected)
        .layer(Extension(Arc::new(services)))
        .layer(ServiceBuilder::new())
}
