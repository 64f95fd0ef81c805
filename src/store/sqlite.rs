use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, ffi, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::rbac::RoleId;
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// "?,?,?" for building IN clauses.
fn placeholders(count: usize) -> String {
    let mut s = String::with_capacity(count * 2);
    for i in 0..count {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

fn domain_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Domain> {
    Ok(Domain {
        domain: row.get(0)?,
        deployment_id: row.get(1)?,
        port: row.get(2)?,
        verified: row.get(3)?,
        published: row.get(4)?,
        challenge: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const DOMAIN_COLUMNS: &str =
    "domain, deployment_id, port, verified, published, challenge, created_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Organization operations

    fn create_organization(&self, org: &Organization) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![org.id, org.name, format_datetime(&org.created_at)],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("organization '{}' already exists", org.name))
                } else {
                    Error::from(e)
                }
            })?;
        Ok(())
    }

    fn get_organization(&self, id: &Id) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at FROM organizations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Organization {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at FROM organizations WHERE name = ?1",
            params![name],
            |row| {
                Ok(Organization {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn add_organization_member(&self, user_id: &Id, organization_id: &Id) -> Result<()> {
        self.conn().execute(
            "INSERT INTO organization_members (user_id, organization_id) VALUES (?1, ?2)
             ON CONFLICT (user_id, organization_id) DO NOTHING",
            params![user_id, organization_id],
        )?;
        Ok(())
    }

    fn list_user_organizations(&self, user_id: &Id) -> Result<Vec<Id>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT organization_id FROM organization_members WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id,
                    user.username,
                    user.password_hash,
                    format_datetime(&user.created_at),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("username '{}' already taken", user.username))
                } else {
                    Error::from(e)
                }
            })?;
        Ok(())
    }

    fn get_user(&self, id: &Id) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Resource registry

    fn create_resource(&self, resource: &Resource) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO resources (id, name, resource_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    resource.id,
                    resource.name,
                    resource.resource_type.as_str(),
                    format_datetime(&resource.created_at),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("resource '{}' already exists", resource.name))
                } else {
                    Error::from(e)
                }
            })?;
        Ok(())
    }

    fn get_resource_by_name(&self, name: &str) -> Result<Option<Resource>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, resource_type, created_at FROM resources WHERE name = ?1",
            params![name],
            |row| {
                let type_str: String = row.get(2)?;
                Ok(Resource {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    resource_type: ResourceType::parse(&type_str).unwrap_or(
                        // Unknown types cannot round-trip; treat as plain
                        // organization-scoped object.
                        ResourceType::Organization,
                    ),
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Grant store

    fn upsert_user_grant(&self, grant: &UserGrant) -> Result<()> {
        self.conn().execute(
            "INSERT INTO user_grants (user_id, resource_id, role_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, resource_id)
             DO UPDATE SET role_id = ?3, updated_at = ?5",
            params![
                grant.user_id,
                grant.resource_id,
                grant.role_id,
                format_datetime(&grant.created_at),
                format_datetime(&grant.updated_at),
            ],
        )?;
        Ok(())
    }

    fn upsert_org_grant(&self, grant: &OrgGrant) -> Result<()> {
        self.conn().execute(
            "INSERT INTO organization_grants (organization_id, resource_id, role_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (organization_id, resource_id)
             DO UPDATE SET role_id = ?3, updated_at = ?5",
            params![
                grant.organization_id,
                grant.resource_id,
                grant.role_id,
                format_datetime(&grant.created_at),
                format_datetime(&grant.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_user_grant(&self, user_id: &Id, resource_id: &Id) -> Result<Option<UserGrant>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, resource_id, role_id, created_at, updated_at
             FROM user_grants WHERE user_id = ?1 AND resource_id = ?2",
            params![user_id, resource_id],
            |row| {
                Ok(UserGrant {
                    user_id: row.get(0)?,
                    resource_id: row.get(1)?,
                    role_id: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    updated_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_grant_roles(
        &self,
        user_id: &Id,
        resource_names: &[String],
    ) -> Result<Vec<RoleId>> {
        if resource_names.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let sql = format!(
            "SELECT g.role_id FROM user_grants g
             JOIN resources r ON r.id = g.resource_id
             WHERE g.user_id = ? AND r.name IN ({})",
            placeholders(resource_names.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut args: Vec<&dyn ToSql> = vec![user_id];
        for name in resource_names {
            args.push(name);
        }
        let rows = stmt.query_map(args.as_slice(), |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_org_grant_roles(
        &self,
        organization_ids: &[Id],
        resource_names: &[String],
    ) -> Result<Vec<RoleId>> {
        if organization_ids.is_empty() || resource_names.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let sql = format!(
            "SELECT g.role_id FROM organization_grants g
             JOIN resources r ON r.id = g.resource_id
             WHERE g.organization_id IN ({}) AND r.name IN ({})",
            placeholders(organization_ids.len()),
            placeholders(resource_names.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut args: Vec<&dyn ToSql> = Vec::with_capacity(
            organization_ids.len() + resource_names.len(),
        );
        for id in organization_ids {
            args.push(id);
        }
        for name in resource_names {
            args.push(name);
        }
        let rows = stmt.query_map(args.as_slice(), |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Server operations

    fn create_server(&self, server: &Server) -> Result<()> {
        self.conn().execute(
            "INSERT INTO servers (id, host, port, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                server.id,
                server.host,
                server.port,
                format_datetime(&server.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_server(&self, id: &Id) -> Result<Option<Server>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, host, port, created_at FROM servers WHERE id = ?1",
            params![id],
            |row| {
                Ok(Server {
                    id: row.get(0)?,
                    host: row.get(1)?,
                    port: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Deployment operations

    fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        let configuration = serde_json::to_string(&deployment.configuration)
            .map_err(|e| Error::BadRequest(format!("invalid configuration: {e}")))?;
        let host_config = serde_json::to_string(&deployment.host_config)
            .map_err(|e| Error::BadRequest(format!("invalid host config: {e}")))?;
        self.conn().execute(
            "INSERT INTO deployments (id, repository, tag, configuration, host_config, server_id, organization_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                deployment.id,
                deployment.repository,
                deployment.tag,
                configuration,
                host_config,
                deployment.server_id,
                deployment.organization_id,
                format_datetime(&deployment.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_deployment(&self, id: &Id) -> Result<Option<Deployment>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, repository, tag, configuration, host_config, server_id, organization_id, created_at
             FROM deployments WHERE id = ?1",
            params![id],
            |row| {
                let configuration: String = row.get(3)?;
                let host_config: String = row.get(4)?;
                Ok(Deployment {
                    id: row.get(0)?,
                    repository: row.get(1)?,
                    tag: row.get(2)?,
                    configuration: serde_json::from_str(&configuration)
                        .unwrap_or(serde_json::Value::Null),
                    host_config: serde_json::from_str(&host_config).unwrap_or_default(),
                    server_id: row.get(5)?,
                    organization_id: row.get(6)?,
                    created_at: parse_datetime(&row.get::<_, String>(7)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_deployment_host_config(&self, id: &Id, host_config: &PortBindings) -> Result<()> {
        let encoded = serde_json::to_string(host_config)
            .map_err(|e| Error::BadRequest(format!("invalid host config: {e}")))?;
        let rows = self.conn().execute(
            "UPDATE deployments SET host_config = ?1 WHERE id = ?2",
            params![encoded, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_deployment(&self, id: &Id) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM deployments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Domain operations

    fn create_domain(&self, domain: &Domain) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO domains (domain, deployment_id, port, verified, published, challenge, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    domain.domain,
                    domain.deployment_id,
                    domain.port,
                    domain.verified,
                    domain.published,
                    domain.challenge,
                    format_datetime(&domain.created_at),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("domain '{}' is already mapped", domain.domain))
                } else {
                    Error::from(e)
                }
            })?;
        Ok(())
    }

    fn get_domain(&self, domain: &str) -> Result<Option<Domain>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE domain = ?1"),
            params![domain],
            domain_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_deployment_domains(&self, deployment_id: &Id) -> Result<Vec<Domain>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE deployment_id = ?1 ORDER BY domain"
        ))?;
        let rows = stmt.query_map(params![deployment_id], domain_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_verified_unpublished_domains(&self) -> Result<Vec<Domain>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE verified = 1 AND published = 0 ORDER BY domain"
        ))?;
        let rows = stmt.query_map([], domain_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn mark_domain_verified(&self, domain: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE domains SET verified = 1 WHERE domain = ?1",
            params![domain],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn mark_domain_published(&self, domain: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE domains SET published = 1 WHERE domain = ?1",
            params![domain],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_domain(&self, domain: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM domains WHERE domain = ?1", params![domain])?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
