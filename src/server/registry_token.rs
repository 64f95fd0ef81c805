use std::sync::Arc;

use axum::{
    Json,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use base64::Engine;
use serde_json::{Value, json};

use crate::error::Error;

use super::router::AppState;

/// The docker registry protocol has its own error envelope; the standard
/// `{data, error}` wrapper would be misread by clients.
fn registry_error(error_code: &str, message: &str) -> Value {
    json!({
        "errors": [{
            "code": error_code,
            "message": message,
            "detail": []
        }]
    })
}

fn denied() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(registry_error("DENIED", "Invalid username or password")),
    )
}

fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

struct TokenQuery {
    scopes: Vec<String>,
    service: Option<String>,
}

fn parse_query(raw: Option<&str>) -> TokenQuery {
    let mut query = TokenQuery {
        scopes: Vec::new(),
        service: None,
    };
    let Some(raw) = raw else { return query };
    for pair in raw.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let Ok(value) = urlencoding::decode(value) else {
            continue;
        };
        match key {
            "scope" => query.scopes.push(value.into_owned()),
            "service" => query.service = Some(value.into_owned()),
            _ => {}
        }
    }
    query
}

/// `GET /token`: the endpoint the docker registry redirects clients to.
/// Success is `{"token": "<JWT>"}`; every failure is the registry's error
/// envelope, credential failures with 401 and no detail about which half
/// was wrong.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some((username, password)) = parse_basic_auth(&headers) else {
        return denied();
    };

    let query = parse_query(raw_query.as_deref());
    if let Some(service) = &query.service {
        if service != state.issuer.signer().audience() {
            return (
                StatusCode::BAD_REQUEST,
                Json(registry_error(
                    "UNSUPPORTED",
                    "Invalid request sent by the client. Service is not valid",
                )),
            );
        }
    }

    match state.issuer.issue_token(&username, &password, &query.scopes) {
        Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))),
        Err(Error::Unauthorized) => denied(),
        Err(Error::BadRequest(message)) => (
            StatusCode::BAD_REQUEST,
            Json(registry_error("UNSUPPORTED", &message)),
        ),
        Err(e) => {
            tracing::error!("Registry token issuance failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(registry_error(
                    "UNSUPPORTED",
                    "An internal server error has occurred. Please try again later",
                )),
            )
        }
    }
}
