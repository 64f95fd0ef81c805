use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::rbac::{self, RoleCatalog};
use crate::types::{Id, Organization, OrgGrant, Permission, Resource, ResourceType, UserGrant};

use super::access::require_permission;
use super::dto::{CreateOrganizationRequest, GrantOrganizationRequest, GrantUserRequest, OrganizationResponse};
use super::identity::Identity;
use super::response::{ApiError, ApiResponse, StoreOptionExt};
use super::router::AppState;
use super::validation::validate_organization_name;

/// Creating an organization provisions its deployer and registry resources
/// and makes the creator the owner of the deployer.
pub async fn create_organization(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrganizationRequest>,
) -> impl IntoResponse {
    require_permission(
        &state,
        &identity,
        &state.site_admin_resource,
        Permission::ORG_CREATE,
    )?;
    validate_organization_name(&req.name)?;

    let creator = state
        .store
        .get_user(&identity.principal)?
        .ok_or_else(|| ApiError::bad_request("Principal is not a known user"))?;

    let now = Utc::now();
    let org = Organization {
        id: Id::generate(),
        name: req.name.clone(),
        created_at: now,
    };
    state.store.create_organization(&org)?;

    let mut deployer_resource_id = None;
    for (suffix, resource_type) in [
        ("", ResourceType::Organization),
        ("::deployer", ResourceType::Deployer),
        ("::docker_registry", ResourceType::DockerRegistry),
    ] {
        let resource = Resource {
            id: Id::generate(),
            name: format!("{}{}", req.name, suffix),
            resource_type,
            created_at: now,
        };
        state.store.create_resource(&resource)?;
        if resource_type == ResourceType::Deployer {
            deployer_resource_id = Some(resource.id);
        }
    }

    if let Some(resource_id) = deployer_resource_id {
        state.store.upsert_user_grant(&UserGrant {
            user_id: creator.id,
            resource_id,
            role_id: rbac::OWNER,
            created_at: now,
            updated_at: now,
        })?;
    }
    state.store.add_organization_member(&creator.id, &org.id)?;

    tracing::info!("Organization {} created by {}", org.name, creator.username);
    Ok::<_, ApiError>(Json(ApiResponse::success(OrganizationResponse {
        id: org.id,
        name: org.name,
    })))
}

fn grant_user(
    state: &AppState,
    identity: &Identity,
    resource_name: &str,
    req: &GrantUserRequest,
) -> Result<(), ApiError> {
    require_permission(state, identity, resource_name, Permission::RESOURCE_GRANT)?;

    if !RoleCatalog::is_known(req.role_id) {
        return Err(ApiError::bad_request(format!(
            "Unknown role id {}",
            req.role_id
        )));
    }

    let resource = state
        .store
        .get_resource_by_name(resource_name)?
        .or_not_found("Resource not found")?;
    let user = state
        .store
        .get_user_by_username(&req.username)?
        .or_not_found("User not found")?;

    let now = Utc::now();
    state.store.upsert_user_grant(&UserGrant {
        user_id: user.id,
        resource_id: resource.id,
        role_id: req.role_id,
        created_at: now,
        updated_at: now,
    })?;

    // A grant on the organization resource itself is membership: the group
    // id set the gateway forwards (and the token issuer resolves) includes
    // this organization from now on.
    if resource.resource_type == ResourceType::Organization {
        let org = state
            .store
            .get_organization_by_name(&resource.name)?
            .or_not_found("Organization not found")?;
        state.store.add_organization_member(&user.id, &org.id)?;
    }

    Ok(())
}

/// Grants a role on `{org}::{resource}` to a single user.
pub async fn grant_user_on_resource(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path((org, resource)): Path<(String, String)>,
    Json(req): Json<GrantUserRequest>,
) -> impl IntoResponse {
    let resource_name = format!("{org}::{resource}");
    grant_user(&state, &identity, &resource_name, &req)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(())))
}

/// Grants a role on the organization itself, which also makes the user a
/// member.
pub async fn grant_user_on_organization(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    Json(req): Json<GrantUserRequest>,
) -> impl IntoResponse {
    grant_user(&state, &identity, &org, &req)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(())))
}

/// Grants a role on `{org}::{resource}` to a whole organization (delegated
/// authorization).
pub async fn grant_organization_on_resource(
    identity: Identity,
    State(state): State<Arc<AppState>>,
    Path((org, resource)): Path<(String, String)>,
    Json(req): Json<GrantOrganizationRequest>,
) -> impl IntoResponse {
    let resource_name = format!("{org}::{resource}");
    require_permission(&state, &identity, &resource_name, Permission::RESOURCE_GRANT)?;

    if !RoleCatalog::is_known(req.role_id) {
        return Err(ApiError::bad_request(format!(
            "Unknown role id {}",
            req.role_id
        )));
    }

    let resource = state
        .store
        .get_resource_by_name(&resource_name)?
        .or_not_found("Resource not found")?;
    let grantee = state
        .store
        .get_organization_by_name(&req.organization)?
        .or_not_found("Organization not found")?;

    let now = Utc::now();
    state.store.upsert_org_grant(&OrgGrant {
        organization_id: grantee.id,
        resource_id: resource.id,
        role_id: req.role_id,
        created_at: now,
        updated_at: now,
    })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(())))
}
