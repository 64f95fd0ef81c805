use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::exposure::{CommandDispatcher, ExposureManager};
use crate::rbac::Evaluator;
use crate::registry::TokenIssuer;
use crate::store::Store;

use super::{deployments, domains, orgs, registry_token};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub evaluator: Arc<Evaluator>,
    pub exposure: Arc<ExposureManager>,
    pub issuer: Arc<TokenIssuer>,
    pub dispatcher: Arc<CommandDispatcher>,
    /// Resource name the organization-creation endpoint is gated on.
    pub site_admin_resource: String,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/token", get(registry_token::issue_token))
        .route("/api/v1/organizations", post(orgs::create_organization))
        .route(
            "/api/v1/organizations/{org}/users",
            post(orgs::grant_user_on_organization),
        )
        .route(
            "/api/v1/organizations/{org}/resources/{resource}/users",
            post(orgs::grant_user_on_resource),
        )
        .route(
            "/api/v1/organizations/{org}/resources/{resource}/organizations",
            post(orgs::grant_organization_on_resource),
        )
        .route(
            "/api/v1/organizations/{org}/deployments",
            post(deployments::create_deployment),
        )
        .route(
            "/api/v1/organizations/{org}/deployments/{id}",
            delete(deployments::delete_deployment),
        )
        .route(
            "/api/v1/organizations/{org}/deployments/{id}/host-config",
            put(deployments::update_host_config),
        )
        .route(
            "/api/v1/organizations/{org}/domains",
            post(domains::add_domain).delete(domains::remove_domain),
        )
        .route(
            "/api/v1/organizations/{org}/domains/verify",
            post(domains::verify_domain),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
