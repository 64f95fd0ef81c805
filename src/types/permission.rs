use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission represents a bitmask of granted permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const ORG_CREATE: Permission = Permission(1 << 0); // 1
    pub const RESOURCE_GRANT: Permission = Permission(1 << 1); // 2
    pub const DEPLOYER_CREATE: Permission = Permission(1 << 2); // 4
    pub const DEPLOYER_DELETE: Permission = Permission(1 << 3); // 8
    pub const DOMAIN_ADD: Permission = Permission(1 << 4); // 16
    pub const DOMAIN_VERIFY: Permission = Permission(1 << 5); // 32
    pub const DOMAIN_REMOVE: Permission = Permission(1 << 6); // 64
    pub const REGISTRY_PUSH: Permission = Permission(1 << 7); // 128
    pub const REGISTRY_PULL: Permission = Permission(1 << 8); // 256

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Every permission bit, including ones no role's static set names.
    /// The owner role grants this.
    pub const fn all() -> Self {
        Self(u32::MAX)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this permission bitmask contains the required permission.
    #[must_use]
    pub const fn has(self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }

    /// Combines two permission bitmasks.
    #[must_use]
    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// Keeps only the permissions present in both bitmasks.
    #[must_use]
    pub const fn intersection(self, other: Permission) -> Permission {
        Permission(self.0 & other.0)
    }

    /// Removes permissions from this bitmask.
    #[must_use]
    pub const fn difference(self, other: Permission) -> Permission {
        Permission(self.0 & !other.0)
    }

    /// Converts a permission string to its bitmask value.
    pub fn parse(s: &str) -> Option<Permission> {
        match s {
            "organization:create" => Some(Self::ORG_CREATE),
            "resource:grant" => Some(Self::RESOURCE_GRANT),
            "deployer:create" => Some(Self::DEPLOYER_CREATE),
            "deployer:delete" => Some(Self::DEPLOYER_DELETE),
            "deployer:domain:add" => Some(Self::DOMAIN_ADD),
            "deployer:domain:verify" => Some(Self::DOMAIN_VERIFY),
            "deployer:domain:remove" => Some(Self::DOMAIN_REMOVE),
            "registry:push" => Some(Self::REGISTRY_PUSH),
            "registry:pull" => Some(Self::REGISTRY_PULL),
            _ => None,
        }
    }

    /// Converts a slice of permission strings to a combined bitmask.
    pub fn parse_many(strs: &[&str]) -> Option<Permission> {
        let mut result = Permission::default();
        for s in strs {
            result = result.union(Self::parse(s)?);
        }
        Some(result)
    }

    /// Returns a slice of permission strings for this bitmask.
    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut perms = Vec::new();
        if self.has(Self::ORG_CREATE) {
            perms.push("organization:create");
        }
        if self.has(Self::RESOURCE_GRANT) {
            perms.push("resource:grant");
        }
        if self.has(Self::DEPLOYER_CREATE) {
            perms.push("deployer:create");
        }
        if self.has(Self::DEPLOYER_DELETE) {
            perms.push("deployer:delete");
        }
        if self.has(Self::DOMAIN_ADD) {
            perms.push("deployer:domain:add");
        }
        if self.has(Self::DOMAIN_VERIFY) {
            perms.push("deployer:domain:verify");
        }
        if self.has(Self::DOMAIN_REMOVE) {
            perms.push("deployer:domain:remove");
        }
        if self.has(Self::REGISTRY_PUSH) {
            perms.push("registry:push");
        }
        if self.has(Self::REGISTRY_PULL) {
            perms.push("registry:pull");
        }
        perms
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<u32> for Permission {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Permission> for u32 {
    fn from(p: Permission) -> Self {
        p.0
    }
}

impl From<i64> for Permission {
    fn from(bits: i64) -> Self {
        Self(bits as u32)
    }
}

impl From<Permission> for i64 {
    fn from(p: Permission) -> Self {
        p.0 as i64
    }
}
