use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::exposure::{DeployJob, OutboundCommand};
use crate::types::{Deployment, Id, Permission, PortBindings};

use super::access::require_permission;
use super::dto::{CreateDeploymentRequest, UpdateHostConfigRequest};
use super::identity::Identity;
use super::response::{ApiError, ApiResponse, StoreOptionExt};
use super::router::AppState;

fn deployer_resource(org: &str) -> String {
    format!("{org}::deployer")
}

fn deployment_in_org(
    state: &AppState,
    org_name: &str,
    deployment_id: &Id,
) -> Result<Deployment, ApiError> {
    let org = state
        .store
        .get_organization_by_name(org_name)?
        .or_not_found("Organization not found")?;
    let deployment = state
        .store
        .get_deployment(deployment_id)?
        .or_not_found("Deployment not found")?;
    if deployment.organization_id != org.id {
        return Err(ApiError::not_found("Deployment not found"));
    }
    Ok(deployment)
}

pub async fn create_deployment(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path(org_name): Path<String>,
    Json(req): Json<CreateDeploymentRequest>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &deployer_resource(&org_name),
        Permission::DEPLOYER_CREATE,
    )?;

    let org = state
        .store
        .get_organization_by_name(&org_name)?
        .or_not_found("Organization not found")?;
    let server = state
        .store
        .get_server(&req.server_id)?
        .or_not_found("Server not found")?;

    // Port bindings are not taken from the caller; the deploy executor
    // reports them once containers are running.
    let deployment = Deployment {
        id: Id::generate(),
        repository: req.repository,
        tag: req.tag,
        configuration: req.configuration,
        host_config: PortBindings::default(),
        server_id: server.id,
        organization_id: org.id,
        created_at: Utc::now(),
    };
    state.store.create_deployment(&deployment)?;

    state.dispatcher.send_background(OutboundCommand::TriggerDeploy {
        jobs: vec![DeployJob {
            deployment_id: deployment.id,
            repository: deployment.repository.clone(),
            tag: deployment.tag.clone(),
            server_host: server.host,
        }],
    });

    tracing::info!("Deployment {} created in {}", deployment.id, org_name);
    Ok::<_, ApiError>(Json(ApiResponse::success(deployment)))
}

pub async fn delete_deployment(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path((org_name, deployment_id)): Path<(String, Id)>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &deployer_resource(&org_name),
        Permission::DEPLOYER_DELETE,
    )?;

    let deployment = deployment_in_org(&state, &org_name, &deployment_id)?;
    state.exposure.delete_deployment(&deployment.id).await?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// The deploy executor reports the externally-bound ports of a running
/// deployment; domain additions resolve against this table.
pub async fn update_host_config(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path((org_name, deployment_id)): Path<(String, Id)>,
    Json(req): Json<UpdateHostConfigRequest>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &deployer_resource(&org_name),
        Permission::DEPLOYER_CREATE,
    )?;

    let deployment = deployment_in_org(&state, &org_name, &deployment_id)?;
    state
        .store
        .update_deployment_host_config(&deployment.id, &req.host_config)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(())))
}
