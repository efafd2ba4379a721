//! WebFinger document for the local account
//!
//! Remote servers resolve the gateway's `keyId` through it to find the
//! public key its requests are signed with.

use super::model::{WebFingerLink, WebFingerResponse};

const PROFILE_PAGE_REL: &str = "http://webfinger.net/rel/profile-page";

/// Actor URL of a local account
pub fn actor_url(base_url: &str, username: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), username)
}

/// Generate WebFinger response for the local account.
///
/// # Arguments
/// * `username` - Local username
/// * `domain` - Public domain
/// * `base_url` - Public base URL (includes protocol)
pub fn generate_webfinger_response(username: &str, domain: &str, base_url: &str) -> WebFingerResponse {
    let actor_url = actor_url(base_url, username);

    WebFingerResponse {
        subject: Some(format!("acct:{}@{}", username, domain)),
        aliases: Some(vec![actor_url.clone()]),
        links: vec![
            WebFingerLink {
                rel: PROFILE_PAGE_REL.to_string(),
                link_type: Some("text/html".to_string()),
                href: Some(actor_url.clone()),
            },
            WebFingerLink {
                rel: "self".to_string(),
                link_type: Some("application/activity+json".to_string()),
                href: Some(actor_url),
            },
        ],
    }
}

/// Whether a `resource` query value designates the local account
///
/// Accepts `acct:user@domain` (case-insensitive) and the actor URL itself.
pub fn resource_matches(resource: &str, username: &str, domain: &str, base_url: &str) -> bool {
    let resource = resource.trim();
    if let Some(acct) = resource.strip_prefix("acct:") {
        return acct.eq_ignore_ascii_case(&format!("{}@{}", username, domain));
    }
    resource == actor_url(base_url, username)
}
