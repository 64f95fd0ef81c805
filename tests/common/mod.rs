use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use base64::Engine;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use dockhand::auth::CredentialHasher;
use dockhand::error::{Error, Result};
use dockhand::exposure::{
    CertificateProvisioner, ChallengeDir, ChallengeProbe, CommandDispatcher, CommandTransport,
    ExposureManager, OutboundCommand, ProxyWriter,
};
use dockhand::rbac::Evaluator;
use dockhand::registry::{RegistrySigner, TokenIssuer};
use dockhand::server::{AppState, PRINCIPAL_GROUPS_HEADER, PRINCIPAL_ID_HEADER, create_router};
use dockhand::store::{SqliteStore, Store};
use dockhand::types::{Id, Organization, Resource, ResourceType, User};

pub const PRIVATE_KEY_PEM: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/registry-key.pem"));
pub const PUBLIC_KEY_PEM: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/registry-pub.pem"));
pub const PUBLIC_KEY_DER: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/registry-pub.der"));

pub const ISSUER: &str = "dockhand";
pub const SERVICE: &str = "registry.example.com";

#[derive(Default)]
pub struct MockProbe {
    responses: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockProbe {
    pub fn respond(&self, domain: &str, body: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert(domain.to_string(), body.to_vec());
    }
}

#[async_trait]
impl ChallengeProbe for MockProbe {
    async fn fetch(&self, domain: &str, _challenge_hex: &str) -> Result<Vec<u8>> {
        self.responses
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::Upstream("connection refused".into()))
    }
}

#[derive(Default)]
pub struct RecordingTls {
    pub issued: Mutex<Vec<String>>,
    pub revoked: Mutex<Vec<String>>,
}

#[async_trait]
impl CertificateProvisioner for RecordingTls {
    async fn issue(&self, domain: &str) -> Result<()> {
        self.issued.lock().unwrap().push(domain.to_string());
        Ok(())
    }

    async fn revoke(&self, domain: &str) -> Result<()> {
        self.revoked.lock().unwrap().push(domain.to_string());
        Ok(())
    }
}

struct NullTransport;

#[async_trait]
impl CommandTransport for NullTransport {
    async fn deliver(&self, _command: &OutboundCommand) -> Result<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub probe: Arc<MockProbe>,
    pub tls: Arc<RecordingTls>,
    pub site_admin_org: Organization,
    pub admin: User,
    hasher: CredentialHasher,
    _webroot: tempfile::TempDir,
    _conf_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.initialize().unwrap();

        let hasher = CredentialHasher::new();
        let now = Utc::now();

        // What `dockhand admin init` seeds.
        let site_admin_org = Organization {
            id: Id::generate(),
            name: "site_admins".into(),
            created_at: now,
        };
        store.create_organization(&site_admin_org).unwrap();
        store
            .create_resource(&Resource {
                id: Id::generate(),
                name: "site_admins".into(),
                resource_type: ResourceType::Organization,
                created_at: now,
            })
            .unwrap();
        let admin = User {
            id: Id::generate(),
            username: "admin".into(),
            password_hash: hasher.hash("admin-password").unwrap(),
            created_at: now,
        };
        store.create_user(&admin).unwrap();
        store
            .add_organization_member(&admin.id, &site_admin_org.id)
            .unwrap();

        let webroot = tempfile::tempdir().unwrap();
        let conf_dir = tempfile::tempdir().unwrap();
        let probe = Arc::new(MockProbe::default());
        let tls = Arc::new(RecordingTls::default());
        let dispatcher = Arc::new(
            CommandDispatcher::new(Arc::new(NullTransport))
                .with_retry(1, Duration::from_millis(1)),
        );

        let evaluator = Arc::new(Evaluator::new(store.clone(), site_admin_org.id));
        let exposure = Arc::new(ExposureManager::new(
            store.clone(),
            ChallengeDir::new(webroot.path()),
            probe.clone(),
            tls.clone(),
            ProxyWriter::new(conf_dir.path()),
            dispatcher.clone(),
        ));
        let signer = RegistrySigner::new(
            PRIVATE_KEY_PEM,
            PUBLIC_KEY_DER,
            ISSUER.into(),
            SERVICE.into(),
        )
        .unwrap();
        let issuer = Arc::new(TokenIssuer::new(store.clone(), evaluator.clone(), signer));

        let state = Arc::new(AppState {
            store: store.clone(),
            evaluator,
            exposure,
            issuer,
            dispatcher,
            site_admin_resource: "site_admins".into(),
        });

        Self {
            router: create_router(state),
            store,
            probe,
            tls,
            site_admin_org,
            admin,
            hasher,
            _webroot: webroot,
            _conf_dir: conf_dir,
        }
    }

    pub fn create_user(&self, username: &str, password: &str) -> User {
        let user = User {
            id: Id::generate(),
            username: username.into(),
            password_hash: self.hasher.hash(password).unwrap(),
            created_at: Utc::now(),
        };
        self.store.create_user(&user).unwrap();
        user
    }

    /// Identity headers the auth gateway would forward for this user.
    pub fn identity_headers(&self, user: &User, groups: &[Id]) -> Vec<(String, String)> {
        let mut headers = vec![(PRINCIPAL_ID_HEADER.to_string(), user.id.to_string())];
        if !groups.is_empty() {
            let joined = groups
                .iter()
                .map(Id::to_string)
                .collect::<Vec<_>>()
                .join(",");
            headers.push((PRINCIPAL_GROUPS_HEADER.to_string(), joined));
        }
        headers
    }

    pub fn admin_headers(&self) -> Vec<(String, String)> {
        let admin = self.admin.clone();
        self.identity_headers(&admin, &[self.site_admin_org.id])
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        headers: &[(String, String)],
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get_token(&self, username: &str, password: &str, scopes: &[&str]) -> Response<Body> {
        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{username}:{password}"));
        let query = scopes
            .iter()
            .map(|s| format!("scope={s}"))
            .collect::<Vec<_>>()
            .join("&");
        let uri = if query.is_empty() {
            format!("/token?service={SERVICE}")
        } else {
            format!("/token?service={SERVICE}&{query}")
        };
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Basic {auth}"))
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
