use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// External certificate issuance. The process is invoked with the bare
/// domain name; the underlying ACME exchange is not this crate's concern.
/// Issuance already in flight is never cancelled; a later call is the retry
/// path.
#[async_trait]
pub trait CertificateProvisioner: Send + Sync {
    async fn issue(&self, domain: &str) -> Result<()>;
    async fn revoke(&self, domain: &str) -> Result<()>;
}

/// Runs configured shell commands with `{domain}` substituted, e.g.
/// `certbot certonly --webroot -w /var/www/challenges -d {domain} -n`.
pub struct CommandProvisioner {
    issue_command: String,
    revoke_command: String,
}

impl CommandProvisioner {
    pub fn new(issue_command: impl Into<String>, revoke_command: impl Into<String>) -> Self {
        Self {
            issue_command: issue_command.into(),
            revoke_command: revoke_command.into(),
        }
    }

    async fn run(&self, template: &str, domain: &str) -> Result<()> {
        let command = template.replace("{domain}", domain);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .await
            .map_err(|e| Error::Upstream(format!("failed to spawn '{command}': {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Upstream(format!(
                "'{command}' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateProvisioner for CommandProvisioner {
    async fn issue(&self, domain: &str) -> Result<()> {
        tracing::info!("Requesting certificate for {domain}");
        self.run(&self.issue_command, domain).await
    }

    async fn revoke(&self, domain: &str) -> Result<()> {
        tracing::info!("Revoking certificate for {domain}");
        self.run(&self.revoke_command, domain).await
    }
}
