use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Token lifetime mandated by the registry protocol deployment: 10 minutes.
pub const TOKEN_TTL_SECS: u64 = 600;

const JTI_LEN: usize = 32;
const KID_HASH_BYTES: usize = 30;
const KID_GROUP_LEN: usize = 4;

/// One `access` entry of a registry token. A scope the user was denied
/// entirely still appears, with an empty action list: omitting the claim
/// would read as "scope unknown" rather than "access denied".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryAccess {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: u64,
    pub nbf: u64,
    pub iat: u64,
    pub jti: String,
    pub access: Vec<RegistryAccess>,
}

impl RegistryClaims {
    pub fn new(
        iss: String,
        aud: String,
        sub: String,
        iat: u64,
        access: Vec<RegistryAccess>,
    ) -> Self {
        Self {
            iss,
            sub,
            aud,
            exp: iat + TOKEN_TTL_SECS,
            nbf: iat,
            iat,
            jti: thread_rng()
                .sample_iter(Alphanumeric)
                .map(char::from)
                .take(JTI_LEN)
                .collect(),
            access,
        }
    }
}

/// Derives the JWT `kid` the registry expects: SHA-256 over the DER-encoded
/// public key, truncated to 240 bits, RFC4648 base32 without padding,
/// re-chunked into 4-character groups joined by `:`.
#[must_use]
pub fn derive_kid(public_key_der: &[u8]) -> String {
    let hash: Vec<u8> = Sha256::digest(public_key_der)
        .into_iter()
        .take(KID_HASH_BYTES)
        .collect();
    let encoded = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &hash);
    let mut kid = String::with_capacity(encoded.len() + encoded.len() / KID_GROUP_LEN);
    for (i, character) in encoded.chars().enumerate() {
        kid.push(character);
        if i % KID_GROUP_LEN == KID_GROUP_LEN - 1 && i != encoded.len() - 1 {
            kid.push(':');
        }
    }
    kid
}

/// Signs registry tokens. The `kid` is computed once, at construction, from
/// the signing key's DER public form.
pub struct RegistrySigner {
    encoding_key: EncodingKey,
    kid: String,
    issuer: String,
    audience: String,
}

impl RegistrySigner {
    pub fn new(
        private_key_pem: &[u8],
        public_key_der: &[u8],
        issuer: String,
        audience: String,
    ) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| Error::Config(format!("invalid registry signing key: {e}")))?;
        Ok(Self {
            encoding_key,
            kid: derive_kid(public_key_der),
            issuer,
            audience,
        })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn sign(&self, claims: &RegistryClaims) -> Result<String> {
        let header = Header {
            alg: Algorithm::RS256,
            kid: Some(self.kid.clone()),
            ..Default::default()
        };
        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .map_err(|e| Error::Upstream(format!("failed to sign registry token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kid_golden_value() {
        // Any byte string works for the derivation; it only hashes the input.
        let der: Vec<u8> = (0u8..64).collect();
        assert_eq!(
            derive_kid(&der),
            "7XVL:TLHT:OEBW:FPJG:LDG4:TIU6:R6OH:K76P:TAIW:AOUM:IR6N:DWIV"
        );
    }

    #[test]
    fn test_kid_is_deterministic() {
        let der = b"the same key every time";
        assert_eq!(derive_kid(der), derive_kid(der));
    }

    #[test]
    fn test_kid_shape() {
        let kid = derive_kid(b"some key material");
        // 30 hashed bytes -> 48 base32 chars -> 12 groups of 4 with 11 colons.
        assert_eq!(kid.len(), 59);
        assert_eq!(kid.split(':').count(), 12);
        assert!(kid.split(':').all(|group| group.len() == 4));
        assert!(!kid.ends_with(':'));
    }

    #[test]
    fn test_claims_expiry_and_jti() {
        let claims = RegistryClaims::new(
            "dockhand".into(),
            "registry.example.com".into(),
            "bob".into(),
            1_700_000_000,
            vec![],
        );
        assert_eq!(claims.exp, claims.iat + TOKEN_TTL_SECS);
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.jti.len(), 32);

        let other = RegistryClaims::new(
            "dockhand".into(),
            "registry.example.com".into(),
            "bob".into(),
            1_700_000_000,
            vec![],
        );
        assert_ne!(claims.jti, other.jti);
    }

    #[test]
    fn test_access_serializes_with_type_field() {
        let access = RegistryAccess {
            resource_type: "repository".into(),
            name: "acme/app".into(),
            actions: vec!["pull".into()],
        };
        let json = serde_json::to_value(&access).unwrap();
        assert_eq!(json["type"], "repository");
        assert_eq!(json["actions"][0], "pull");
    }
}
