use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs;

use crate::error::Result;

/// Well-known path segment the challenge is served under. The webroot is
/// assumed to be exported by an existing web server for every pending domain.
pub const CHALLENGE_PATH: &str = ".well-known/dockhand-challenge";

/// Generates a random 128-bit challenge token, hex-encoded.
#[must_use]
pub fn generate_challenge() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Writes and removes challenge artifacts under the shared webroot.
pub struct ChallengeDir {
    webroot: PathBuf,
}

impl ChallengeDir {
    pub fn new(webroot: impl Into<PathBuf>) -> Self {
        Self {
            webroot: webroot.into(),
        }
    }

    fn path_for(&self, challenge_hex: &str) -> PathBuf {
        self.webroot.join(CHALLENGE_PATH).join(challenge_hex)
    }

    /// Publishes the challenge: the file body is the hex string itself, which
    /// the verifier compares byte-for-byte.
    pub async fn publish(&self, challenge_hex: &str) -> Result<()> {
        let path = self.path_for(challenge_hex);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, challenge_hex).await?;
        Ok(())
    }

    pub async fn remove(&self, challenge_hex: &str) -> Result<()> {
        match fs::remove_file(self.path_for(challenge_hex)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn exists(&self, challenge_hex: &str) -> bool {
        self.path_for(challenge_hex).exists()
    }

    #[must_use]
    pub fn webroot(&self) -> &Path {
        &self.webroot
    }
}
