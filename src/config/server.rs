use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_site_admin_org() -> String {
    "site_admins".to_string()
}

fn default_verify_timeout() -> u64 {
    5
}

fn default_reconcile_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Name of the organization whose members bypass permission evaluation.
    #[serde(default = "default_site_admin_org")]
    pub site_admin_org: String,
    pub exposure: ExposureConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExposureConfig {
    /// Webroot an existing web server exports for pending domains; challenge
    /// artifacts are written under its well-known path.
    pub webroot: PathBuf,
    /// Directory the reverse proxy loads per-domain vhost files from.
    pub proxy_conf_dir: PathBuf,
    /// Fire-and-forget reload, e.g. "nginx -s reload".
    pub proxy_reload_command: String,
    /// Certificate process templates; `{domain}` is substituted.
    pub cert_issue_command: String,
    pub cert_revoke_command: String,
    /// Command handed the deploy job list via `{payload}`.
    #[serde(default)]
    pub deploy_command: Option<String>,
    #[serde(default = "default_verify_timeout")]
    pub verify_timeout_secs: u64,
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub issuer: String,
    /// The registry's service name; doubles as the token audience.
    pub service: String,
    /// RSA signing key, PEM. The registry must be configured with the
    /// matching certificate.
    pub private_key_path: PathBuf,
    /// DER-encoded public key; the `kid` header is derived from these exact
    /// bytes.
    pub public_key_der_path: PathBuf,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {e}")))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("dockhand.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_with_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [exposure]
            webroot = "/var/www/challenges"
            proxy_conf_dir = "/etc/nginx/conf.d/dockhand"
            proxy_reload_command = "nginx -s reload"
            cert_issue_command = "certbot certonly --webroot -w /var/www/challenges -d {domain} -n"
            cert_revoke_command = "certbot revoke --cert-name {domain} -n"

            [registry]
            issuer = "dockhand"
            service = "registry.example.com"
            private_key_path = "/etc/dockhand/registry-key.pem"
            public_key_der_path = "/etc/dockhand/registry-pub.der"
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.site_admin_org, "site_admins");
        assert_eq!(config.exposure.verify_timeout_secs, 5);
        assert!(config.exposure.deploy_command.is_none());
        assert_eq!(config.db_path(), PathBuf::from("./data/dockhand.db"));
    }

    #[test]
    fn test_rejects_missing_sections() {
        assert!(toml::from_str::<ServerConfig>("host = \"0.0.0.0\"").is_err());
    }
}
