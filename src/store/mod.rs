mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::rbac::RoleId;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Organization operations
    fn create_organization(&self, org: &Organization) -> Result<()>;
    fn get_organization(&self, id: &Id) -> Result<Option<Organization>>;
    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>>;
    fn add_organization_member(&self, user_id: &Id, organization_id: &Id) -> Result<()>;
    fn list_user_organizations(&self, user_id: &Id) -> Result<Vec<Id>>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &Id) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // Resource registry (deletion is deliberately absent)
    fn create_resource(&self, resource: &Resource) -> Result<()>;
    fn get_resource_by_name(&self, name: &str) -> Result<Option<Resource>>;

    // Grant store: one row per (subject, resource), re-granting replaces the role
    fn upsert_user_grant(&self, grant: &UserGrant) -> Result<()>;
    fn upsert_org_grant(&self, grant: &OrgGrant) -> Result<()>;
    fn get_user_grant(&self, user_id: &Id, resource_id: &Id) -> Result<Option<UserGrant>>;
    fn list_user_grant_roles(&self, user_id: &Id, resource_names: &[String])
    -> Result<Vec<RoleId>>;
    fn list_org_grant_roles(
        &self,
        organization_ids: &[Id],
        resource_names: &[String],
    ) -> Result<Vec<RoleId>>;

    // Server operations
    fn create_server(&self, server: &Server) -> Result<()>;
    fn get_server(&self, id: &Id) -> Result<Option<Server>>;

    // Deployment operations
    fn create_deployment(&self, deployment: &Deployment) -> Result<()>;
    fn get_deployment(&self, id: &Id) -> Result<Option<Deployment>>;
    fn update_deployment_host_config(&self, id: &Id, host_config: &PortBindings) -> Result<()>;
    fn delete_deployment(&self, id: &Id) -> Result<bool>;

    // Domain operations
    fn create_domain(&self, domain: &Domain) -> Result<()>;
    fn get_domain(&self, domain: &str) -> Result<Option<Domain>>;
    fn list_deployment_domains(&self, deployment_id: &Id) -> Result<Vec<Domain>>;
    fn list_verified_unpublished_domains(&self) -> Result<Vec<Domain>>;
    fn mark_domain_verified(&self, domain: &str) -> Result<()>;
    fn mark_domain_published(&self, domain: &str) -> Result<()>;
    fn delete_domain(&self, domain: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
