use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::Result;

/// Writes per-domain virtual-host definitions into the reverse proxy's
/// config directory. The proxy itself is out of process; it picks changes up
/// on the reload signal.
pub struct ProxyWriter {
    conf_dir: PathBuf,
}

impl ProxyWriter {
    pub fn new(conf_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
        }
    }

    fn vhost_path(&self, domain: &str) -> PathBuf {
        self.conf_dir.join(format!("{domain}.conf"))
    }

    /// Port 80 redirects to 443; TLS traffic is forwarded to the deployment's
    /// externally-bound port on its server.
    pub async fn write_vhost(&self, domain: &str, server_host: &str, machine_port: u16) -> Result<()> {
        fs::create_dir_all(&self.conf_dir).await?;
        let config = render_vhost(domain, server_host, machine_port);
        fs::write(self.vhost_path(domain), config).await?;
        Ok(())
    }

    pub async fn remove_vhost(&self, domain: &str) -> Result<()> {
        match fs::remove_file(self.vhost_path(domain)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn vhost_exists(&self, domain: &str) -> bool {
        self.vhost_path(domain).exists()
    }

    #[must_use]
    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }
}

fn render_vhost(domain: &str, server_host: &str, machine_port: u16) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name {domain};

    return 301 https://$host$request_uri;
}}

server {{
    listen 443 ssl;
    server_name {domain};

    ssl_certificate /etc/letsencrypt/live/{domain}/fullchain.pem;
    ssl_certificate_key /etc/letsencrypt/live/{domain}/privkey.pem;

    location / {{
        proxy_pass http://{server_host}:{machine_port};
        proxy_set_header Host $host;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto https;
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_remove_vhost() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ProxyWriter::new(dir.path());

        writer
            .write_vhost("a.example.com", "10.0.0.4", 32768)
            .await
            .unwrap();
        assert!(writer.vhost_exists("a.example.com"));

        let config =
            std::fs::read_to_string(dir.path().join("a.example.com.conf")).unwrap();
        assert!(config.contains("server_name a.example.com;"));
        assert!(config.contains("proxy_pass http://10.0.0.4:32768;"));
        assert!(config.contains("return 301 https://$host$request_uri;"));

        writer.remove_vhost("a.example.com").await.unwrap();
        assert!(!writer.vhost_exists("a.example.com"));
        // Removing a missing vhost is a no-op.
        writer.remove_vhost("a.example.com").await.unwrap();
    }
}
