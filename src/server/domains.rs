use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::types::{Domain, Permission};

use super::access::require_permission;
use super::dto::{AddDomainRequest, DomainRequest, DomainResponse, VerifyDomainResponse};
use super::identity::Identity;
use super::response::{ApiError, ApiResponse, StoreOptionExt};
use super::router::AppState;

fn deployer_resource(org: &str) -> String {
    format!("{org}::deployer")
}

/// Looks the domain up and checks it belongs to a deployment of the path's
/// organization; anything else is indistinguishable from absent.
fn domain_in_org(state: &AppState, org_name: &str, domain: &str) -> Result<Domain, ApiError> {
    let org = state
        .store
        .get_organization_by_name(org_name)?
        .or_not_found("Organization not found")?;
    let row = state
        .store
        .get_domain(domain)?
        .or_not_found("Domain not found")?;
    let deployment = state
        .store
        .get_deployment(&row.deployment_id)?
        .or_not_found("Domain not found")?;
    if deployment.organization_id != org.id {
        return Err(ApiError::not_found("Domain not found"));
    }
    Ok(row)
}

pub async fn add_domain(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path(org_name): Path<String>,
    Json(req): Json<AddDomainRequest>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &deployer_resource(&org_name),
        Permission::DOMAIN_ADD,
    )?;

    let org = state
        .store
        .get_organization_by_name(&org_name)?
        .or_not_found("Organization not found")?;
    let deployment = state
        .store
        .get_deployment(&req.deployment_id)?
        .or_not_found("Deployment not found")?;
    if deployment.organization_id != org.id {
        return Err(ApiError::not_found("Deployment not found"));
    }

    let row = state
        .exposure
        .add_domain(&deployment.id, &req.domain, req.port)
        .await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(DomainResponse::from(row))))
}

pub async fn verify_domain(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path(org_name): Path<String>,
    Json(req): Json<DomainRequest>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &deployer_resource(&org_name),
        Permission::DOMAIN_VERIFY,
    )?;

    domain_in_org(&state, &org_name, &req.domain)?;
    let verified = state.exposure.verify_domain(&req.domain).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(VerifyDomainResponse {
        success: true,
        verified,
    })))
}

pub async fn remove_domain(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path(org_name): Path<String>,
    Json(req): Json<DomainRequest>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &deployer_resource(&org_name),
        Permission::DOMAIN_REMOVE,
    )?;

    domain_in_org(&state, &org_name, &req.domain)?;
    state.exposure.remove_domain(&req.domain).await?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
