//! Local actor document
//!
//! Remote servers fetch it to verify the gateway's signed requests, so its
//! `publicKeyPem` must be the signer's export byte for byte.

use axum::{
    Router,
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::AppState;
use crate::error::AppError;
use crate::federation::actor_url;

pub const ACTOR_CONTENT_TYPE: &str =
    r#"application/ld+json; profile="https://www.w3.org/ns/activitystreams""#;

/// Create actor router
///
/// Routes:
/// - GET /:username - Actor document of the local account
pub fn actor_router() -> Router<AppState> {
    Router::new().route("/:username", get(actor))
}

/// GET /:username
async fn actor(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    if username != state.identity.username() {
        return Err(AppError::NotFound);
    }

    let document = actor_document(
        &state.config.server.base_url(),
        state.identity.username(),
        state.signer.public_key_pem(),
    );
    let body = serde_json::to_string(&document).map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(CONTENT_TYPE, ACTOR_CONTENT_TYPE)], body).into_response())
}

/// Build the actor document of the local account
pub fn actor_document(base_url: &str, username: &str, public_key_pem: &str) -> serde_json::Value {
    let actor_url = actor_url(base_url, username);

    serde_json::json!({
        "@context": [
            "https://www.w3.org/ns/activitystreams",
            "https://w3id.org/security/v1"
        ],
        "id": actor_url,
        "type": "Person",
        "preferredUsername": username,
        "inbox": format!("{}/inbox", actor_url),
        "outbox": format!("{}/outbox", actor_url),
        "publicKey": {
            "id": format!("{}#main-key", actor_url),
            "owner": actor_url,
            "publicKeyPem": public_key_pem
        }
    })
}
