use std::time::Duration;

use async_trait::async_trait;

use super::challenge::CHALLENGE_PATH;
use crate::error::{Error, Result};

/// Fetches the challenge body a domain serves, proving control of it.
/// Implementations must bound the request with a short timeout; DNS still
/// propagating is an expected condition, not a failure of the caller.
#[async_trait]
pub trait ChallengeProbe: Send + Sync {
    async fn fetch(&self, domain: &str, challenge_hex: &str) -> Result<Vec<u8>>;
}

/// Plain-HTTP probe against the well-known challenge path. Verification
/// happens before any TLS exists for the domain, so HTTP is the only option.
pub struct HttpChallengeProbe {
    client: reqwest::Client,
}

impl HttpChallengeProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChallengeProbe for HttpChallengeProbe {
    async fn fetch(&self, domain: &str, challenge_hex: &str) -> Result<Vec<u8>> {
        let url = format!("http://{domain}/{CHALLENGE_PATH}/{challenge_hex}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("challenge fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "challenge fetch returned {}",
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("challenge body read failed: {e}")))?;
        Ok(body.to_vec())
    }
}
