use crate::types::Permission;

pub type RoleId = i64;

/// Reserved role: grants every permission on its resource without
/// consulting any permission set.
pub const OWNER: RoleId = 0;
pub const ADMIN: RoleId = 1;
pub const DEPLOYER: RoleId = 2;
pub const REGISTRY_PUBLISHER: RoleId = 3;
pub const REGISTRY_CONSUMER: RoleId = 4;

#[derive(Debug, Clone, Copy)]
pub struct Role {
    pub id: RoleId,
    pub name: &'static str,
    pub permissions: Permission,
}

const ROLES: &[Role] = &[
    Role {
        id: ADMIN,
        name: "admin",
        permissions: Permission::new(
            Permission::RESOURCE_GRANT.bits()
                | Permission::DEPLOYER_CREATE.bits()
                | Permission::DEPLOYER_DELETE.bits()
                | Permission::DOMAIN_ADD.bits()
                | Permission::DOMAIN_VERIFY.bits()
                | Permission::DOMAIN_REMOVE.bits()
                | Permission::REGISTRY_PUSH.bits()
                | Permission::REGISTRY_PULL.bits(),
        ),
    },
    Role {
        id: DEPLOYER,
        name: "deployer",
        permissions: Permission::new(
            Permission::DEPLOYER_CREATE.bits()
                | Permission::DOMAIN_ADD.bits()
                | Permission::DOMAIN_VERIFY.bits()
                | Permission::DOMAIN_REMOVE.bits(),
        ),
    },
    Role {
        id: REGISTRY_PUBLISHER,
        name: "registry-publisher",
        permissions: Permission::new(
            Permission::REGISTRY_PUSH.bits() | Permission::REGISTRY_PULL.bits(),
        ),
    },
    Role {
        id: REGISTRY_CONSUMER,
        name: "registry-consumer",
        permissions: Permission::new(Permission::REGISTRY_PULL.bits()),
    },
];

/// The fixed, compile-time role table. Unknown role ids grant nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleCatalog;

impl RoleCatalog {
    #[must_use]
    pub fn get(role_id: RoleId) -> Option<&'static Role> {
        ROLES.iter().find(|r| r.id == role_id)
    }

    #[must_use]
    pub fn is_known(role_id: RoleId) -> bool {
        role_id == OWNER || Self::get(role_id).is_some()
    }

    /// Whether `role_id` grants `permission`.
    #[must_use]
    pub fn grants(&self, role_id: RoleId, permission: Permission) -> bool {
        self.granted_permissions(role_id, permission).has(permission)
    }

    /// The subset of `requested` that `role_id` grants.
    #[must_use]
    pub fn granted_permissions(&self, role_id: RoleId, requested: Permission) -> Permission {
        let set = if role_id == OWNER {
            Permission::all()
        } else {
            match Self::get(role_id) {
                Some(role) => role.permissions,
                None => return Permission::default(),
            }
        };
        set.intersection(requested)
    }
}
