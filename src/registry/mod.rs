mod issuer;
mod scope;
mod token;

pub use issuer::TokenIssuer;
pub use scope::{ScopeAction, ScopeRequest};
pub use token::{RegistryAccess, RegistryClaims, RegistrySigner, TOKEN_TTL_SECS, derive_kid};
