//! Well-known endpoints
//!
//! - /.well-known/webfinger

use axum::{
    Router,
    extract::{Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::federation::{generate_webfinger_response, resource_matches};

const JRD_CONTENT_TYPE: &str = "application/jrd+json";

/// Create well-known router
///
/// Routes:
/// - GET /.well-known/webfinger
pub fn wellknown_router() -> Router<AppState> {
    Router::new().route("/.well-known/webfinger", get(webfinger))
}

/// WebFinger query parameters
#[derive(Debug, Deserialize)]
struct WebFingerQuery {
    resource: Option<String>,
}

/// GET /.well-known/webfinger
///
/// Only the local account exists. Without `resource` its JRD is returned
/// as is; a `resource` naming anyone else is a 404.
async fn webfinger(
    State(state): State<AppState>,
    Query(query): Query<WebFingerQuery>,
) -> Result<Response, AppError> {
    let server = &state.config.server;
    let base_url = server.base_url();
    let username = state.identity.username();

    if let Some(resource) = query.resource.as_deref() {
        if !resource_matches(resource, username, &server.domain, &base_url) {
            tracing::debug!(resource, "WebFinger lookup for unknown account");
            return Err(AppError::NotFound);
        }
    }

    let response = generate_webfinger_response(username, &server.domain, &base_url);
    let body = serde_json::to_string(&response).map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(CONTENT_TYPE, JRD_CONTENT_TYPE)], body).into_response())
}
