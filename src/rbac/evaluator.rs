use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Id, Permission};

use super::{RoleCatalog, ancestor_chain};

/// The outcome of a permission evaluation: the subset of the requested
/// permissions that resolved to granted. Different permissions in one call
/// can resolve differently; callers needing an all-or-nothing gate use
/// [`GrantSet::all_granted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantSet {
    requested: Permission,
    granted: Permission,
}

impl GrantSet {
    fn none(requested: Permission) -> Self {
        Self {
            requested,
            granted: Permission::default(),
        }
    }

    fn all(requested: Permission) -> Self {
        Self {
            requested,
            granted: requested,
        }
    }

    fn grant(&mut self, permissions: Permission) {
        self.granted = self.granted.union(permissions.intersection(self.requested));
    }

    #[must_use]
    pub fn requested(&self) -> Permission {
        self.requested
    }

    #[must_use]
    pub fn granted(&self) -> Permission {
        self.granted
    }

    #[must_use]
    pub fn is_granted(&self, permission: Permission) -> bool {
        self.granted.has(permission)
    }

    #[must_use]
    pub fn all_granted(&self) -> bool {
        self.granted.has(self.requested)
    }
}

/// Answers "can this principal, with these group memberships, perform these
/// permissions on this resource name". Pure read: absence of permission is a
/// normal `false`, never an error.
pub struct Evaluator {
    store: Arc<dyn Store>,
    catalog: RoleCatalog,
    site_admin_org: Id,
}

impl Evaluator {
    /// `site_admin_org` is the configuration-injected sentinel: any principal
    /// whose group set contains it bypasses evaluation entirely.
    pub fn new(store: Arc<dyn Store>, site_admin_org: Id) -> Self {
        Self {
            store,
            catalog: RoleCatalog,
            site_admin_org,
        }
    }

    pub fn evaluate(
        &self,
        principal: Id,
        groups: &[Id],
        resource_name: &str,
        requested: Permission,
    ) -> Result<GrantSet> {
        if resource_name.is_empty() {
            return Err(Error::BadRequest("resource name cannot be empty".into()));
        }

        if groups.contains(&self.site_admin_org) {
            return Ok(GrantSet::all(requested));
        }

        let chain = ancestor_chain(resource_name);
        let mut result = GrantSet::none(requested);

        if !groups.is_empty() {
            for role_id in self.store.list_org_grant_roles(groups, &chain)? {
                result.grant(self.catalog.granted_permissions(role_id, requested));
            }
            // All requested permissions already granted through group
            // memberships; the user-grant lookup can be skipped.
            if result.all_granted() {
                return Ok(result);
            }
        }

        for role_id in self.store.list_user_grant_roles(&principal, &chain)? {
            result.grant(self.catalog.granted_permissions(role_id, requested));
        }

        Ok(result)
    }
}
