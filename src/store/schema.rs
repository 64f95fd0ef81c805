pub const SCHEMA: &str = r#"
-- Organizations are the tenant boundary; they can hold grants themselves
CREATE TABLE IF NOT EXISTS organizations (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Users hold credentials; identity verification happens upstream, the
-- password hash is only consulted by the registry token endpoint
CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS organization_members (
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    organization_id BLOB NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, organization_id)
);

-- Authorization objects; names are globally unique and encode hierarchy
-- with a '::' delimiter. Resource deletion is not supported yet.
CREATE TABLE IF NOT EXISTS resources (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    resource_type TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Grants: the role a user holds on a resource, one row per (user, resource)
CREATE TABLE IF NOT EXISTS user_grants (
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    resource_id BLOB NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, resource_id)
);

-- Delegated grants: the role an organization holds on a resource
CREATE TABLE IF NOT EXISTS organization_grants (
    organization_id BLOB NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    resource_id BLOB NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (organization_id, resource_id)
);

-- Execution targets deployments run on
CREATE TABLE IF NOT EXISTS servers (
    id BLOB PRIMARY KEY,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS deployments (
    id BLOB PRIMARY KEY,
    repository TEXT NOT NULL,
    tag TEXT NOT NULL,
    configuration TEXT NOT NULL,       -- opaque container spec (JSON)
    host_config TEXT NOT NULL,         -- container port -> host port (JSON)
    server_id BLOB NOT NULL REFERENCES servers(id),
    organization_id BLOB NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Domains never outlive their deployment. The PRIMARY KEY is the
-- authoritative uniqueness check for concurrent additions. Teardown is
-- code-managed (external artifacts must go first), so no ON DELETE CASCADE.
CREATE TABLE IF NOT EXISTS domains (
    domain TEXT PRIMARY KEY,
    deployment_id BLOB NOT NULL REFERENCES deployments(id),
    port INTEGER NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    published INTEGER NOT NULL DEFAULT 0,
    challenge TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_org_members_user ON organization_members(user_id);
CREATE INDEX IF NOT EXISTS idx_user_grants_user ON user_grants(user_id);
CREATE INDEX IF NOT EXISTS idx_org_grants_org ON organization_grants(organization_id);
CREATE INDEX IF NOT EXISTS idx_deployments_org ON deployments(organization_id);
CREATE INDEX IF NOT EXISTS idx_domains_deployment ON domains(deployment_id);
"#;
