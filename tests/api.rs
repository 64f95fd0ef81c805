mod common;

use axum::http::StatusCode;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;

use dockhand::store::Store;
use dockhand::types::{Id, Server};

use common::{SERVICE, TestApp, body_json};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    access: Vec<Access>,
}

#[derive(Debug, Deserialize)]
struct Access {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    actions: Vec<String>,
}

fn decode_claims(token: &str) -> Claims {
    let key = DecodingKey::from_rsa_pem(common::PUBLIC_KEY_PEM).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[SERVICE]);
    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .unwrap()
        .claims
}

async fn create_org(app: &TestApp, name: &str) -> StatusCode {
    let response = app
        .request(
            "POST",
            "/api/v1/organizations",
            &app.admin_headers(),
            Some(json!({ "name": name })),
        )
        .await;
    response.status()
}

fn seed_server(app: &TestApp) -> Server {
    let server = Server {
        id: Id::generate(),
        host: "10.0.0.4".into(),
        port: 2376,
        created_at: Utc::now(),
    };
    app.store.create_server(&server).unwrap();
    server
}

#[tokio::test]
async fn health_works_unauthenticated() {
    let app = TestApp::new();
    let response = app.request("GET", "/health", &[], None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn organization_creation_provisions_resources() {
    let app = TestApp::new();
    assert_eq!(create_org(&app, "acme").await, StatusCode::OK);

    for name in ["acme", "acme::deployer", "acme::docker_registry"] {
        assert!(
            app.store.get_resource_by_name(name).unwrap().is_some(),
            "missing resource {name}"
        );
    }

    // The creator owns the deployer resource.
    let deployer = app
        .store
        .get_resource_by_name("acme::deployer")
        .unwrap()
        .unwrap();
    let grant = app
        .store
        .get_user_grant(&app.admin.id, &deployer.id)
        .unwrap()
        .unwrap();
    assert_eq!(grant.role_id, dockhand::rbac::OWNER);

    // Duplicate names conflict.
    assert_eq!(create_org(&app, "acme").await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn organization_creation_requires_site_admin() {
    let app = TestApp::new();
    let bob = app.create_user("bob", "hunter2");

    let response = app
        .request(
            "POST",
            "/api/v1/organizations",
            &app.identity_headers(&bob, &[]),
            Some(json!({ "name": "acme" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // And an unauthenticated request is rejected before evaluation.
    let response = app
        .request("POST", "/api/v1/organizations", &[], Some(json!({ "name": "x" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn granting_requires_grant_permission() {
    let app = TestApp::new();
    create_org(&app, "acme").await;
    let bob = app.create_user("bob", "hunter2");

    // Bob has no resource:grant anywhere.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/resources/docker_registry/users",
            &app.identity_headers(&bob, &[]),
            Some(json!({ "username": "bob", "role_id": 4 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Unknown roles are rejected even for site admins.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/resources/docker_registry/users",
            &app.admin_headers(),
            Some(json!({ "username": "bob", "role_id": 99 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registry_token_end_to_end() {
    let app = TestApp::new();
    create_org(&app, "acme").await;
    app.create_user("bob", "hunter2");

    // Bad password: 401 with the registry error envelope, no detail leak.
    let response = app.get_token("bob", "wrong", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["code"], "DENIED");

    // No grants: the scope claim is present with an empty action list.
    let response = app
        .get_token("bob", "hunter2", &["repository:acme/app:push,pull"])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let claims = decode_claims(body["token"].as_str().unwrap());
    assert_eq!(claims.sub, "bob");
    assert_eq!(claims.access.len(), 1);
    assert_eq!(claims.access[0].resource_type, "repository");
    assert_eq!(claims.access[0].name, "acme/app");
    assert!(claims.access[0].actions.is_empty());

    // Grant pull only; push,pull collapses to the granted subset.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/resources/docker_registry/users",
            &app.admin_headers(),
            Some(json!({ "username": "bob", "role_id": dockhand::rbac::REGISTRY_CONSUMER })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get_token("bob", "hunter2", &["repository:acme/app:push,pull"])
        .await;
    let body = body_json(response).await;
    let claims = decode_claims(body["token"].as_str().unwrap());
    assert_eq!(claims.access[0].actions, vec!["pull"]);

    // An unknown action rejects the whole request.
    let response = app
        .get_token("bob", "hunter2", &["repository:acme/app:push,admin"])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn domain_lifecycle_over_http() {
    let app = TestApp::new();
    create_org(&app, "acme").await;
    let server = seed_server(&app);

    // Create a deployment, then feed back the executor's port bindings.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/deployments",
            &app.admin_headers(),
            Some(json!({
                "repository": "acme/app",
                "tag": "latest",
                "configuration": { "Image": "acme/app:latest" },
                "server_id": server.id,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let deployment_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            "PUT",
            &format!("/api/v1/organizations/acme/deployments/{deployment_id}/host-config"),
            &app.admin_headers(),
            Some(json!({ "host_config": { "8080": 32768 } })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Add a domain; a port the deployment does not expose is rejected.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/domains",
            &app.admin_headers(),
            Some(json!({ "domain": "a.example.com", "deployment_id": deployment_id, "port": 9999 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/domains",
            &app.admin_headers(),
            Some(json!({ "domain": "a.example.com", "deployment_id": deployment_id, "port": 8080 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["state"], "pending_verification");

    // Second mapping of the same name conflicts.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/domains",
            &app.admin_headers(),
            Some(json!({ "domain": "a.example.com", "deployment_id": deployment_id, "port": 8080 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Verification fails closed while the domain serves nothing.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/domains/verify",
            &app.admin_headers(),
            Some(json!({ "domain": "a.example.com" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["verified"], false);

    // Serve the challenge and verify for real.
    let challenge = app
        .store
        .get_domain("a.example.com")
        .unwrap()
        .unwrap()
        .challenge;
    app.probe.respond("a.example.com", challenge.as_bytes());

    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/domains/verify",
            &app.admin_headers(),
            Some(json!({ "domain": "a.example.com" })),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["verified"], true);
    assert_eq!(*app.tls.issued.lock().unwrap(), vec!["a.example.com"]);

    // Cascade delete tears down the domain before the deployment row.
    let response = app
        .request(
            "DELETE",
            &format!("/api/v1/organizations/acme/deployments/{deployment_id}"),
            &app.admin_headers(),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.store.get_domain("a.example.com").unwrap().is_none());
    assert_eq!(*app.tls.revoked.lock().unwrap(), vec!["a.example.com"]);
    let deployment_id: Id = deployment_id.parse().unwrap();
    assert!(app.store.get_deployment(&deployment_id).unwrap().is_none());
}

#[tokio::test]
async fn domain_routes_are_tenant_scoped() {
    let app = TestApp::new();
    create_org(&app, "acme").await;
    create_org(&app, "globex").await;
    let server = seed_server(&app);

    let response = app
        .request(
            "POST",
            "/api/v1/organizations/acme/deployments",
            &app.admin_headers(),
            Some(json!({
                "repository": "acme/app",
                "tag": "latest",
                "configuration": {},
                "server_id": server.id,
            })),
        )
        .await;
    let body = body_json(response).await;
    let deployment_id = body["data"]["id"].as_str().unwrap().to_string();

    // A deployment of acme cannot be addressed through globex.
    let response = app
        .request(
            "POST",
            "/api/v1/organizations/globex/domains",
            &app.admin_headers(),
            Some(json!({ "domain": "a.example.com", "deployment_id": deployment_id, "port": 8080 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
