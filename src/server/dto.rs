use serde::{Deserialize, Serialize};

use crate::rbac::RoleId;
use crate::types::{Domain, DomainState, Id, PortBindings};

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantUserRequest {
    pub username: String,
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct GrantOrganizationRequest {
    pub organization: String,
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub repository: String,
    pub tag: String,
    pub configuration: serde_json::Value,
    pub server_id: Id,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHostConfigRequest {
    pub host_config: PortBindings,
}

#[derive(Debug, Deserialize)]
pub struct AddDomainRequest {
    pub domain: String,
    pub deployment_id: Id,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DomainRequest {
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct DomainResponse {
    pub domain: String,
    pub deployment_id: Id,
    pub port: u16,
    pub state: DomainState,
}

impl From<Domain> for DomainResponse {
    fn from(d: Domain) -> Self {
        Self {
            state: d.state(),
            domain: d.domain,
            deployment_id: d.deployment_id,
            port: d.port,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyDomainResponse {
    pub success: bool,
    pub verified: bool,
}
