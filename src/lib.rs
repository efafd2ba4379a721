//! apfinger - ActivityPub to Finger gateway
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Finger Layer (TCP, port 79)                  │
//! │  - One task per connection                                  │
//! │  - Address defaults and validation                          │
//! │  - Plain-text rendering                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Federation Layer                         │
//! │  - WebFinger → actor → outbox → outbox page                 │
//! │  - Signed requests (HTTP Signatures, rsa-sha256)            │
//! │  - Concurrent repost resolution                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Local actor document and WebFinger                       │
//! │  - Health and metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `finger`: Finger protocol server
//! - `federation`: ActivityPub client, signatures and wire types
//! - `api`: HTTP handlers remote servers use to verify signatures
//! - `identity`: Local account name and key pair
//! - `tasks`: Execution context for request-scoped tasks
//! - `text`: Word wrapping
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod config;
pub mod error;
pub mod federation;
pub mod finger;
pub mod identity;
pub mod metrics;
pub mod tasks;
pub mod text;

use std::sync::Arc;

/// Application state shared by the HTTP handlers and the Finger server
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Local account and key pair
    pub identity: Arc<identity::Identity>,

    /// Request signer built from the identity
    pub signer: Arc<federation::HttpSigner>,

    /// Outbound ActivityPub client
    pub client: federation::ActivityPubClient,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Load or create the local identity
    /// 2. Build the request signer (self-checked)
    /// 3. Build the ActivityPub client
    ///
    /// # Errors
    /// Returns error if the key pair cannot be loaded or does not sign
    /// correctly; both are fatal at startup
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let identity = identity::Identity::load_or_create(&config.identity)?;
        tracing::info!(username = %identity.username(), "Identity loaded");

        let signer = Arc::new(federation::HttpSigner::new(
            &identity,
            &config.server.base_url(),
        )?);
        tracing::info!(key_id = %signer.key_id(), "Request signer ready");

        let client = federation::ActivityPubClient::new(&config.federation, signer.clone())?;

        Ok(Self {
            config: Arc::new(config),
            identity: Arc::new(identity),
            signer,
            client,
        })
    }

    /// Handler for Finger connections, sharing this state's client
    pub fn finger_handler(&self) -> finger::FingerHandler {
        finger::FingerHandler::new(self.client.clone(), self.config.finger.clone())
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::wellknown_router())
        .merge(api::actor_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
