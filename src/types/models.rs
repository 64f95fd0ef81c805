use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;
use crate::rbac::RoleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Organization,
    Deployer,
    DockerRegistry,
}

impl ResourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Deployer => "deployer",
            Self::DockerRegistry => "docker_registry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(Self::Organization),
            "deployer" => Some(Self::Deployer),
            "docker_registry" => Some(Self::DockerRegistry),
            _ => None,
        }
    }
}

/// An authorization-addressable named entity. Names are globally unique and
/// immutable; hierarchy is encoded with a `::` delimiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Id,
    pub name: String,
    pub resource_type: ResourceType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGrant {
    pub user_id: Id,
    pub resource_id: Id,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgGrant {
    pub organization_id: Id,
    pub resource_id: Id,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The execution target a deployment runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: Id,
    pub host: String,
    pub port: u16,
    pub created_at: DateTime<Utc>,
}

/// Container port to externally-bound host port table, reported back by the
/// deploy executor once containers are running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortBindings(pub BTreeMap<u16, u16>);

impl PortBindings {
    #[must_use]
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.0.get(&container_port).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Id,
    pub repository: String,
    pub tag: String,
    /// Opaque container spec, passed through to the deploy executor.
    pub configuration: serde_json::Value,
    pub host_config: PortBindings,
    pub server_id: Id,
    pub organization_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainState {
    PendingVerification,
    Verified,
    Published,
}

/// A custom domain bound to a deployment. Exists only while the deployment
/// does; `verified` and `published` track the exposure state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub domain: String,
    pub deployment_id: Id,
    pub port: u16,
    pub verified: bool,
    pub published: bool,
    #[serde(skip)]
    pub challenge: String,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    #[must_use]
    pub fn state(&self) -> DomainState {
        if self.published {
            DomainState::Published
        } else if self.verified {
            DomainState::Verified
        } else {
            DomainState::PendingVerification
        }
    }
}
