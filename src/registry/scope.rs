use crate::error::{Error, Result};
use crate::types::Permission;

/// A single action requested in a docker-registry scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeAction {
    Push,
    Pull,
}

impl ScopeAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "push" => Some(Self::Push),
            "pull" => Some(Self::Pull),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }

    #[must_use]
    pub const fn permission(self) -> Permission {
        match self {
            Self::Push => Permission::REGISTRY_PUSH,
            Self::Pull => Permission::REGISTRY_PULL,
        }
    }
}

/// A parsed `repository:{name}:{actions}` scope from the registry's token
/// request. An unrecognized action is a protocol error that rejects the
/// whole request, not a silently dropped entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequest {
    pub name: String,
    pub actions: Vec<ScopeAction>,
}

impl ScopeRequest {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let resource_type = parts
            .next()
            .ok_or_else(|| Error::BadRequest("empty scope".into()))?;
        let name = parts
            .next()
            .ok_or_else(|| Error::BadRequest("scope has no repository name".into()))?;
        let actions_str = parts
            .next()
            .ok_or_else(|| Error::BadRequest("scope has no actions".into()))?;

        if resource_type != "repository" {
            return Err(Error::BadRequest(format!(
                "unsupported scope type '{resource_type}'"
            )));
        }
        if name.is_empty() {
            return Err(Error::BadRequest("scope has an empty repository name".into()));
        }

        let mut actions = Vec::new();
        for action in actions_str.split(',') {
            let parsed = ScopeAction::parse(action)
                .ok_or_else(|| Error::BadRequest(format!("unknown action '{action}'")))?;
            actions.push(parsed);
        }

        Ok(Self {
            name: name.to_string(),
            actions,
        })
    }

    /// Splits the repository path into (organization, image). A path with no
    /// `/` names no organization and can never be granted anything.
    #[must_use]
    pub fn organization(&self) -> Option<(&str, &str)> {
        self.name.split_once('/')
    }

    /// The combined permission set the requested actions map to.
    #[must_use]
    pub fn permissions(&self) -> Permission {
        self.actions
            .iter()
            .fold(Permission::default(), |acc, a| acc.union(a.permission()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_pull() {
        let scope = ScopeRequest::parse("repository:acme/app:push,pull").unwrap();
        assert_eq!(scope.name, "acme/app");
        assert_eq!(scope.actions, vec![ScopeAction::Push, ScopeAction::Pull]);
        assert_eq!(scope.organization(), Some(("acme", "app")));
        assert_eq!(
            scope.permissions(),
            Permission::REGISTRY_PUSH.union(Permission::REGISTRY_PULL)
        );
    }

    #[test]
    fn test_action_order_is_preserved() {
        let scope = ScopeRequest::parse("repository:acme/app:pull,push").unwrap();
        assert_eq!(scope.actions, vec![ScopeAction::Pull, ScopeAction::Push]);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = ScopeRequest::parse("repository:acme/app:push,delete").unwrap_err();
        assert!(matches!(err, crate::error::Error::BadRequest(_)));
    }

    #[test]
    fn test_non_repository_type_is_rejected() {
        assert!(ScopeRequest::parse("registry:catalog:*").is_err());
    }

    #[test]
    fn test_missing_parts_are_rejected() {
        assert!(ScopeRequest::parse("repository").is_err());
        assert!(ScopeRequest::parse("repository:acme/app").is_err());
        assert!(ScopeRequest::parse("repository::push").is_err());
    }

    #[test]
    fn test_no_org_path() {
        let scope = ScopeRequest::parse("repository:app:pull").unwrap();
        assert_eq!(scope.organization(), None);
    }

    #[test]
    fn test_image_name_with_slash() {
        let scope = ScopeRequest::parse("repository:acme/team/app:pull").unwrap();
        assert_eq!(scope.organization(), Some(("acme", "team/app")));
    }
}
