mod challenge;
mod locks;
mod manager;
mod outbound;
mod probe;
mod proxy;
mod tls;

pub use challenge::{CHALLENGE_PATH, ChallengeDir, generate_challenge};
pub use locks::KeyedLocks;
pub use manager::{ExposureManager, validate_domain_name};
pub use outbound::{CommandDispatcher, CommandTransport, DeployJob, OutboundCommand, ProcessTransport};
pub use probe::{ChallengeProbe, HttpChallengeProbe};
pub use proxy::ProxyWriter;
pub use tls::{CertificateProvisioner, CommandProvisioner};
