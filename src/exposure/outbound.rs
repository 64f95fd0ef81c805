use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::types::Id;

/// One entry of the batch job list handed to the deploy executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployJob {
    pub deployment_id: Id,
    pub repository: String,
    pub tag: String,
    pub server_host: String,
}

/// A command crossing the process boundary. Receivers are idempotent, so
/// at-least-once delivery is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OutboundCommand {
    ReloadProxy,
    TriggerDeploy { jobs: Vec<DeployJob> },
}

impl OutboundCommand {
    fn label(&self) -> &'static str {
        match self {
            Self::ReloadProxy => "reload-proxy",
            Self::TriggerDeploy { .. } => "trigger-deploy",
        }
    }
}

#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn deliver(&self, command: &OutboundCommand) -> Result<()>;
}

/// Delivers commands by executing configured shell commands. The proxy
/// reload is typically `nginx -s reload`; the deploy trigger receives the
/// serialized job list on stdin-free argv via `{payload}`.
pub struct ProcessTransport {
    reload_command: String,
    deploy_command: Option<String>,
}

impl ProcessTransport {
    pub fn new(reload_command: impl Into<String>, deploy_command: Option<String>) -> Self {
        Self {
            reload_command: reload_command.into(),
            deploy_command,
        }
    }

    async fn run(&self, command: &str) -> Result<()> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
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
impl CommandTransport for ProcessTransport {
    async fn deliver(&self, command: &OutboundCommand) -> Result<()> {
        match command {
            OutboundCommand::ReloadProxy => self.run(&self.reload_command).await,
            OutboundCommand::TriggerDeploy { jobs } => {
                let Some(template) = &self.deploy_command else {
                    return Err(Error::Config("no deploy command configured".into()));
                };
                let payload = serde_json::to_string(jobs)
                    .map_err(|e| Error::Upstream(format!("failed to encode jobs: {e}")))?;
                let escaped = payload.replace('\'', r"'\''");
                self.run(&template.replace("{payload}", &format!("'{escaped}'")))
                    .await
            }
        }
    }
}

/// At-least-once delivery over a transport: bounded retries with backoff.
/// `send` blocks until delivered or attempts are exhausted; `send_background`
/// detaches and only logs the final failure.
pub struct CommandDispatcher {
    transport: Arc<dyn CommandTransport>,
    max_attempts: u32,
    backoff: Duration,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub async fn send(&self, command: &OutboundCommand) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.transport.deliver(command).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        "{} delivery attempt {attempt}/{} failed: {e}",
                        command.label(),
                        self.max_attempts
                    );
                    last_error = Some(e);
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }
        Err(match last_error {
            Some(Error::Upstream(m)) => Error::Upstream(m),
            Some(e) => Error::Upstream(e.to_string()),
            None => Error::Upstream("command delivery failed".into()),
        })
    }

    pub fn send_background(self: &Arc<Self>, command: OutboundCommand) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.send(&command).await {
                tracing::error!("background {} delivery failed: {e}", command.label());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct FlakyTransport {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl CommandTransport for FlakyTransport {
        async fn deliver(&self, _command: &OutboundCommand) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(Error::Upstream("transport down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_retries_until_delivered() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let dispatcher = CommandDispatcher::new(transport.clone())
            .with_retry(3, Duration::from_millis(1));

        dispatcher.send(&OutboundCommand::ReloadProxy).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let dispatcher = CommandDispatcher::new(transport.clone())
            .with_retry(2, Duration::from_millis(1));

        let err = dispatcher
            .send(&OutboundCommand::ReloadProxy)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
