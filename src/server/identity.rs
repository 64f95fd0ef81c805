use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::types::Id;

use super::router::AppState;

/// Verifying the caller's access token happens at the gateway in front of
/// this service; it forwards the authenticated principal in these headers.
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_GROUPS_HEADER: &str = "x-principal-groups";

/// The already-authenticated caller: a principal id and the group and
/// organization ids it belongs to.
pub struct Identity {
    pub principal: Id,
    pub groups: Vec<Id>,
}

#[derive(Debug)]
pub enum IdentityError {
    Missing,
    Invalid,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let message = match self {
            IdentityError::Missing => "Authentication required",
            IdentityError::Invalid => "Invalid principal headers",
        };
        let body = json!({ "data": null, "error": message });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = IdentityError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = parts
            .headers
            .get(PRINCIPAL_ID_HEADER)
            .ok_or(IdentityError::Missing)?
            .to_str()
            .map_err(|_| IdentityError::Invalid)?;
        let principal = Id::parse(principal).map_err(|_| IdentityError::Invalid)?;

        let mut groups = Vec::new();
        if let Some(header) = parts.headers.get(PRINCIPAL_GROUPS_HEADER) {
            let header = header.to_str().map_err(|_| IdentityError::Invalid)?;
            for group in header.split(',').filter(|g| !g.trim().is_empty()) {
                groups.push(Id::parse(group.trim()).map_err(|_| IdentityError::Invalid)?);
            }
        }

        Ok(Identity { principal, groups })
    }
}
