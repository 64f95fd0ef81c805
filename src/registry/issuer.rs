use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::CredentialHasher;
use crate::error::{Error, Result};
use crate::rbac::Evaluator;
use crate::store::Store;

use super::scope::ScopeRequest;
use super::token::{RegistryAccess, RegistryClaims, RegistrySigner};

/// Turns a registry token request into a signed, scope-filtered JWT.
///
/// The issuer keeps the granted subset of each scope rather than gating
/// all-or-nothing: `push,pull` with only pull granted yields a token whose
/// claim carries `actions: ["pull"]`.
pub struct TokenIssuer {
    store: Arc<dyn Store>,
    evaluator: Arc<Evaluator>,
    hasher: CredentialHasher,
    signer: RegistrySigner,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn Store>, evaluator: Arc<Evaluator>, signer: RegistrySigner) -> Self {
        Self {
            store,
            evaluator,
            hasher: CredentialHasher::new(),
            signer,
        }
    }

    #[must_use]
    pub fn signer(&self) -> &RegistrySigner {
        &self.signer
    }

    pub fn issue_token(&self, username: &str, password: &str, scopes: &[String]) -> Result<String> {
        let user = self
            .store
            .get_user_by_username(username)?
            .ok_or(Error::Unauthorized)?;
        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(Error::Unauthorized);
        }

        let organizations = self.store.list_user_organizations(&user.id)?;

        let mut access = Vec::with_capacity(scopes.len());
        for raw in scopes {
            let scope = ScopeRequest::parse(raw)?;
            let actions = match scope.organization() {
                // No organization in the path: nothing to evaluate against,
                // the scope is kept with zero granted actions.
                None => Vec::new(),
                Some((org, _image)) => {
                    let resource_name = format!("{org}::docker_registry");
                    let grants = self.evaluator.evaluate(
                        user.id,
                        &organizations,
                        &resource_name,
                        scope.permissions(),
                    )?;
                    scope
                        .actions
                        .iter()
                        .filter(|action| grants.is_granted(action.permission()))
                        .map(|action| action.as_str().to_string())
                        .collect()
                }
            };
            access.push(RegistryAccess {
                resource_type: "repository".to_string(),
                name: scope.name.clone(),
                actions,
            });
        }

        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Upstream(format!("system clock before epoch: {e}")))?
            .as_secs();
        let claims = RegistryClaims::new(
            self.signer.issuer().to_string(),
            self.signer.audience().to_string(),
            username.to_string(),
            iat,
            access,
        );
        self.signer.sign(&claims)
    }
}
