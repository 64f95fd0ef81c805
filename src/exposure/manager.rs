use std::sync::Arc;

use chrono::Utc;

use super::challenge::{ChallengeDir, generate_challenge};
use super::locks::KeyedLocks;
use super::outbound::{CommandDispatcher, OutboundCommand};
use super::probe::ChallengeProbe;
use super::proxy::ProxyWriter;
use super::tls::CertificateProvisioner;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Domain, Id};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Checks RFC-1035-shaped domain names: lowercase alphanumeric labels with
/// interior hyphens, dot-separated, at least two labels.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN || !domain.contains('.') {
        return Err(Error::InvalidDomainFormat);
    }
    for label in domain.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(Error::InvalidDomainFormat);
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::InvalidDomainFormat);
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(Error::InvalidDomainFormat);
        }
    }
    Ok(())
}

/// Drives the domain exposure lifecycle:
/// PendingVerification -> Verified -> Published, Deleted from any state.
///
/// External side effects (challenge webroot, certificate process, proxy
/// config, reload signal) are serialized per domain; deployment-level
/// operations are serialized per deployment so a cascade delete cannot race
/// a concurrent domain addition.
pub struct ExposureManager {
    store: Arc<dyn Store>,
    challenges: ChallengeDir,
    probe: Arc<dyn ChallengeProbe>,
    tls: Arc<dyn CertificateProvisioner>,
    proxy: ProxyWriter,
    dispatcher: Arc<CommandDispatcher>,
    domain_locks: KeyedLocks,
    deployment_locks: KeyedLocks,
}

impl ExposureManager {
    pub fn new(
        store: Arc<dyn Store>,
        challenges: ChallengeDir,
        probe: Arc<dyn ChallengeProbe>,
        tls: Arc<dyn CertificateProvisioner>,
        proxy: ProxyWriter,
        dispatcher: Arc<CommandDispatcher>,
    ) -> Self {
        Self {
            store,
            challenges,
            probe,
            tls,
            proxy,
            dispatcher,
            domain_locks: KeyedLocks::new(),
            deployment_locks: KeyedLocks::new(),
        }
    }

    /// Binds a domain to a deployment and publishes its challenge. The
    /// domain row's primary key is the authoritative uniqueness check:
    /// concurrent additions of the same name resolve to exactly one winner,
    /// the loser gets `Conflict`.
    pub async fn add_domain(
        &self,
        deployment_id: &Id,
        domain: &str,
        container_port: u16,
    ) -> Result<Domain> {
        validate_domain_name(domain)?;

        let lock = self.deployment_locks.get(&deployment_id.to_string());
        let _guard = lock.lock().await;

        let deployment = self
            .store
            .get_deployment(deployment_id)?
            .ok_or(Error::NotFound)?;
        if deployment.host_config.host_port(container_port).is_none() {
            return Err(Error::PortNotExposed(container_port));
        }

        let challenge = generate_challenge();
        self.challenges.publish(&challenge).await?;

        let row = Domain {
            domain: domain.to_string(),
            deployment_id: *deployment_id,
            port: container_port,
            verified: false,
            published: false,
            challenge,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.create_domain(&row) {
            let _ = self.challenges.remove(&row.challenge).await;
            return Err(e);
        }

        tracing::info!("Domain {domain} bound to deployment {deployment_id}");
        Ok(row)
    }

    /// Probes the domain for its challenge and, on a byte-for-byte match,
    /// runs the publication sequence. A mismatch or network error returns
    /// `Ok(false)` with no state change; DNS still propagating is expected
    /// and the caller retries later.
    ///
    /// An `Upstream` error after the domain was marked verified leaves it
    /// Verified-but-not-Published; calling again (or the reconcile pass)
    /// retries publication only.
    pub async fn verify_domain(&self, domain: &str) -> Result<bool> {
        let lock = self.domain_locks.get(domain);
        let _guard = lock.lock().await;

        let row = self.store.get_domain(domain)?.ok_or(Error::NotFound)?;

        if row.verified {
            if !row.published {
                self.publish(&row).await?;
            }
            return Ok(true);
        }

        let body = match self.probe.fetch(domain, &row.challenge).await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Challenge fetch for {domain} failed: {e}");
                return Ok(false);
            }
        };
        if body != row.challenge.as_bytes() {
            tracing::debug!("Challenge mismatch for {domain}");
            return Ok(false);
        }

        self.store.mark_domain_verified(domain)?;
        self.challenges
            .remove(&row.challenge)
            .await
            .map_err(|e| Error::Upstream(format!("failed to remove challenge: {e}")))?;
        self.publish(&row).await?;

        tracing::info!("Domain {domain} verified and published");
        Ok(true)
    }

    /// The publication tail: certificate, proxy vhost, reload, then the
    /// published flag. Certificate issuance already in flight elsewhere is
    /// never cancelled; rerunning the sequence is the retry path.
    async fn publish(&self, row: &Domain) -> Result<()> {
        let deployment = self
            .store
            .get_deployment(&row.deployment_id)?
            .ok_or(Error::NotFound)?;
        let server = self
            .store
            .get_server(&deployment.server_id)?
            .ok_or(Error::NotFound)?;
        let machine_port = deployment
            .host_config
            .host_port(row.port)
            .ok_or(Error::PortNotExposed(row.port))?;

        self.tls.issue(&row.domain).await?;
        self.proxy
            .write_vhost(&row.domain, &server.host, machine_port)
            .await
            .map_err(|e| Error::Upstream(format!("failed to write proxy config: {e}")))?;
        self.dispatcher.send(&OutboundCommand::ReloadProxy).await?;
        self.store.mark_domain_published(&row.domain)?;
        Ok(())
    }

    /// Unbinds a domain: proxy config first, then the TLS certificate (only
    /// if one was ever issued), then the row.
    pub async fn remove_domain(&self, domain: &str) -> Result<()> {
        let lock = self.domain_locks.get(domain);
        let _guard = lock.lock().await;

        let row = self.store.get_domain(domain)?.ok_or(Error::NotFound)?;

        self.proxy.remove_vhost(domain).await?;
        if row.verified {
            self.tls.revoke(domain).await?;
        } else {
            self.challenges.remove(&row.challenge).await?;
        }
        self.store.delete_domain(domain)?;

        if row.published {
            self.dispatcher.send_background(OutboundCommand::ReloadProxy);
        }

        tracing::info!("Domain {domain} removed");
        Ok(())
    }

    /// Tears down every domain of a deployment, then the deployment row.
    /// The ordering is mandatory: a deployment row must never disappear
    /// while published routes still point at it.
    pub async fn delete_deployment(&self, deployment_id: &Id) -> Result<()> {
        let lock = self.deployment_locks.get(&deployment_id.to_string());
        let _guard = lock.lock().await;

        if self.store.get_deployment(deployment_id)?.is_none() {
            return Err(Error::NotFound);
        }

        for domain in self.store.list_deployment_domains(deployment_id)? {
            self.remove_domain(&domain.domain).await?;
        }
        self.store.delete_deployment(deployment_id)?;

        tracing::info!("Deployment {deployment_id} deleted");
        Ok(())
    }

    /// Retries publication for domains stuck Verified-but-not-Published,
    /// e.g. after a crash between verification and the proxy write. Returns
    /// how many were published.
    pub async fn reconcile_unpublished(&self) -> Result<usize> {
        let pending = self.store.list_verified_unpublished_domains()?;
        let mut published = 0;
        for row in pending {
            let lock = self.domain_locks.get(&row.domain);
            let _guard = lock.lock().await;

            // Re-read under the lock; a concurrent verify may have finished.
            let Some(current) = self.store.get_domain(&row.domain)? else {
                continue;
            };
            if current.published || !current.verified {
                continue;
            }
            match self.publish(&current).await {
                Ok(()) => published += 1,
                Err(e) => tracing::warn!("Reconcile of {} failed: {e}", row.domain),
            }
        }
        Ok(published)
    }
}
