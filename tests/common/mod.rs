//! Common test utilities for E2E tests
//!
//! `FakeFediverse` is a small ActivityPub server (WebFinger, actor, outbox,
//! notes) that checks every signed request against the key published by
//! the gateway under test. `TestGateway` runs the real HTTP responder and
//! Finger server on random ports.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apfinger::{AppState, config, finger::FingerServer, tasks::TaskScope};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Published instant used by fixtures unless a test needs another one
pub const PUBLISHED: &str = "2025-03-14T15:09:26Z";

/// `Create` activity embedding a note
pub fn create_item(content: &str, in_reply_to: Option<&str>) -> Value {
    json!({
        "type": "Create",
        "actor": "https://ignored.example/users/someone",
        "object": {
            "type": "Note",
            "published": PUBLISHED,
            "content": content,
            "inReplyTo": in_reply_to,
            "attachment": []
        }
    })
}

/// `Create` activity whose note carries attachments
pub fn create_item_with_attachments(content: &str, urls: &[&str]) -> Value {
    let mut item = create_item(content, None);
    item["object"]["attachment"] = Value::Array(
        urls.iter()
            .map(|url| json!({ "type": "Document", "mediaType": "image/png", "url": url }))
            .collect(),
    );
    item
}

/// `Announce` activity pointing at a note URL
pub fn announce_item(note_url: &str) -> Value {
    json!({
        "type": "Announce",
        "object": note_url
    })
}

/// Standalone note, as served for reposts
pub fn note_object(author: &str, content: &str) -> Value {
    json!({
        "type": "Note",
        "attributedTo": author,
        "published": PUBLISHED,
        "content": content,
        "inReplyTo": null,
        "attachment": []
    })
}

enum FakeNote {
    Served { body: Value, delay: Duration },
    Failing,
}

/// Content of a fake server, built once its base URL is known
#[derive(Default)]
pub struct Fixture {
    accounts: HashMap<String, Vec<Value>>,
    notes: HashMap<String, FakeNote>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account whose first outbox page holds `items`
    pub fn account(mut self, name: &str, items: Vec<Value>) -> Self {
        self.accounts.insert(name.to_string(), items);
        self
    }

    /// Note served at `/notes/<id>` after `delay`
    pub fn note(mut self, id: &str, body: Value, delay: Duration) -> Self {
        self.notes
            .insert(id.to_string(), FakeNote::Served { body, delay });
        self
    }

    /// Note at `/notes/<id>` that answers 500
    pub fn failing_note(mut self, id: &str) -> Self {
        self.notes.insert(id.to_string(), FakeNote::Failing);
        self
    }
}

/// A request the fake server received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub signed: bool,
    pub verified: bool,
}

struct FakeState {
    base: String,
    fixture: Fixture,
    key_client: reqwest::Client,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// In-process ActivityPub server
pub struct FakeFediverse {
    pub addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeFediverse {
    /// Start a server; `build` receives its base URL (`http://127.0.0.1:<port>`)
    pub async fn start(build: impl FnOnce(&str) -> Fixture) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{}", addr);

        let state = Arc::new(FakeState {
            fixture: build(&base),
            base,
            key_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/.well-known/webfinger", get(fake_webfinger))
            .route("/users/:user", get(fake_actor))
            .route("/users/:user/outbox", get(fake_outbox))
            .route("/users/:user/outbox/page", get(fake_outbox_page))
            .route("/notes/:id", get(fake_note))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base(&self) -> &str {
        &self.state.base
    }

    /// `host[:port]` part of addresses on this server
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// `@name@host` on this server
    pub fn address(&self, name: &str) -> String {
        format!("@{}@{}", name, self.host())
    }

    /// Absolute URL of a note served by this server
    pub fn note_url(&self, id: &str) -> String {
        format!("{}/notes/{}", self.state.base, id)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

#[derive(serde::Deserialize)]
struct ResourceQuery {
    resource: String,
}

async fn fake_webfinger(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<ResourceQuery>,
    headers: HeaderMap,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        path: "/.well-known/webfinger".to_string(),
        signed: headers.contains_key("signature"),
        verified: false,
    });

    let acct = query.resource.trim_start_matches("acct:");
    let user = acct.rsplit_once('@').map(|(user, _)| user).unwrap_or(acct);
    if !state.fixture.accounts.contains_key(user) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let actor = format!("{}/users/{}", state.base, user);
    Json(json!({
        "subject": query.resource,
        "links": [
            { "rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": actor },
            { "rel": "self", "type": "application/activity+json", "href": actor }
        ]
    }))
    .into_response()
}

async fn fake_actor(
    State(state): State<Arc<FakeState>>,
    Path(user): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !check_signature(&state, &uri, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !state.fixture.accounts.contains_key(&user) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let actor = format!("{}/users/{}", state.base, user);
    Json(json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": actor,
        "type": "Person",
        "preferredUsername": user,
        "outbox": format!("{}/outbox", actor)
    }))
    .into_response()
}

async fn fake_outbox(
    State(state): State<Arc<FakeState>>,
    Path(user): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !check_signature(&state, &uri, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !state.fixture.accounts.contains_key(&user) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let outbox = format!("{}/users/{}/outbox", state.base, user);
    Json(json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": outbox,
        "type": "OrderedCollection",
        "first": format!("{}/page", outbox)
    }))
    .into_response()
}

async fn fake_outbox_page(
    State(state): State<Arc<FakeState>>,
    Path(user): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !check_signature(&state, &uri, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(items) = state.fixture.accounts.get(&user) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    Json(json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "OrderedCollectionPage",
        "orderedItems": items
    }))
    .into_response()
}

async fn fake_note(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if !check_signature(&state, &uri, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.fixture.notes.get(&id) {
        Some(FakeNote::Served { body, delay }) => {
            tokio::time::sleep(*delay).await;
            Json(body.clone()).into_response()
        }
        Some(FakeNote::Failing) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Verify a request the way a real server does: fetch the `keyId` actor and
/// check the signature against its `publicKeyPem`
async fn check_signature(state: &FakeState, uri: &Uri, headers: &HeaderMap) -> bool {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let signed = headers.contains_key("signature");
    let verified = signed && verify_against_published_key(state, &path, headers).await;

    state.requests.lock().unwrap().push(RecordedRequest {
        path,
        signed,
        verified,
    });
    verified
}

async fn verify_against_published_key(state: &FakeState, path: &str, headers: &HeaderMap) -> bool {
    let Some(signature) = headers.get("signature").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Ok(parsed) = apfinger::federation::parse_signature_header(signature) else {
        return false;
    };

    let Ok(response) = state
        .key_client
        .get(&parsed.key_id)
        .header("Accept", "application/activity+json")
        .send()
        .await
    else {
        return false;
    };
    let Ok(actor) = response.json::<Value>().await else {
        return false;
    };
    let Some(pem) = actor["publicKey"]["publicKeyPem"].as_str() else {
        return false;
    };

    apfinger::federation::verify_signature("GET", path, headers, pem).is_ok()
}

/// Gateway under test: HTTP responder plus Finger server
pub struct TestGateway {
    pub state: AppState,
    pub http_addr: SocketAddr,
    pub finger_addr: SocketAddr,
    pub client: reqwest::Client,
    finger_server: FingerServer,
    _temp_dir: TempDir,
}

impl TestGateway {
    /// Start a gateway whose default address is `default_address` and alias `BoD`
    pub async fn start(default_address: &str) -> Self {
        apfinger::metrics::init_metrics();

        let temp_dir = TempDir::new().unwrap();

        let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_addr = http_listener.local_addr().unwrap();

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                http_port: http_addr.port(),
                domain: http_addr.to_string(),
                protocol: "http".to_string(),
            },
            finger: config::FingerConfig {
                port: 0,
                default_address: default_address.to_string(),
                default_address_alias: "BoD".to_string(),
                post_limit: 3,
                wrap_width: 72,
                max_request_bytes: 1024,
                read_timeout_seconds: 5,
            },
            federation: config::FederationConfig {
                scheme: "http".to_string(),
                timeout_seconds: 5,
                user_agent: "apfinger/test".to_string(),
            },
            identity: config::IdentityConfig {
                data_dir: temp_dir.path().join("identity"),
                username: Some("finger".to_string()),
                key_bits: 1024,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).unwrap();

        let app = apfinger::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(http_listener, app).await.unwrap();
        });

        let finger_server =
            FingerServer::bind("127.0.0.1:0", state.finger_handler(), TaskScope::new())
                .await
                .unwrap();
        let finger_addr = finger_server.local_addr();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            state,
            http_addr,
            finger_addr,
            client,
            finger_server,
            _temp_dir: temp_dir,
        }
    }

    /// Base URL for HTTP requests
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    /// Send one Finger request line and read the answer until close
    pub async fn finger(&self, request: &str) -> String {
        let mut stream = TcpStream::connect(self.finger_addr).await.unwrap();
        stream
            .write_all(format!("{}\r\n", request).as_bytes())
            .await
            .unwrap();

        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(30), stream.read_to_string(&mut response))
            .await
            .expect("Finger response within 30s")
            .unwrap();
        response
    }

    pub async fn shutdown(self) {
        self.finger_server.shutdown().await;
    }
}
