//! Wire types for the documents the resolution pipeline reads
//!
//! Only the fields the gateway needs are modeled; everything else in the
//! JSON-LD documents is ignored.

use serde::{Deserialize, Serialize};

/// WebFinger JRD response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebFingerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default)]
    pub links: Vec<WebFingerLink>,
}

impl WebFingerResponse {
    /// `href` of the first `rel="self"` link
    pub fn self_href(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "self")
            .and_then(|link| link.href.as_deref())
    }
}

/// WebFinger link
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebFingerLink {
    pub rel: String,
    #[serde(rename = "type")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Actor document, reduced to its outbox pointer
#[derive(Debug, Clone, Deserialize)]
pub struct ActorDocument {
    pub outbox: String,
}

/// Outbox collection, reduced to its first page
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxCollection {
    pub first: Reference,
}

/// A link that servers may send either as a bare URL or as an embedded
/// object carrying an `id`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Url(String),
    Object { id: String },
}

impl Reference {
    pub fn url(&self) -> &str {
        match self {
            Reference::Url(url) => url,
            Reference::Object { id } => id,
        }
    }
}

/// One page of an outbox
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxPage {
    #[serde(rename = "orderedItems", default)]
    pub ordered_items: Vec<OutboxItem>,
}

/// Activity in an outbox page
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum OutboxItem {
    /// Original post with its note embedded
    Create { object: NoteObject },
    /// Repost; the note lives on another server and has to be fetched
    Announce { object: String },
    /// Anything else (Update, Like, ...) is skipped
    #[serde(other)]
    Other,
}

impl OutboxItem {
    /// True for a `Create` whose note answers another post
    pub fn is_reply(&self) -> bool {
        matches!(self, OutboxItem::Create { object } if object.in_reply_to.is_some())
    }
}

/// Note object, embedded in a `Create` or fetched for an `Announce`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteObject {
    #[serde(default)]
    pub attributed_to: Option<String>,
    pub published: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub attachment: Vec<AttachmentObject>,
}

/// Media attachment of a note
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentObject {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn webfinger_self_href_picks_self_link() {
        let response: WebFingerResponse = serde_json::from_value(json!({
            "subject": "acct:BoD@mastodon.social",
            "links": [
                {
                    "rel": "http://webfinger.net/rel/profile-page",
                    "type": "text/html",
                    "href": "https://mastodon.social/@BoD"
                },
                {
                    "rel": "self",
                    "type": "application/activity+json",
                    "href": "https://mastodon.social/users/BoD"
                }
            ]
        }))
        .expect("valid JRD");

        assert_eq!(
            response.self_href(),
            Some("https://mastodon.social/users/BoD")
        );
    }

    #[test]
    fn webfinger_without_self_link_has_no_href() {
        let response: WebFingerResponse =
            serde_json::from_value(json!({ "links": [] })).expect("valid JRD");
        assert_eq!(response.self_href(), None);
    }

    #[test]
    fn outbox_first_accepts_url_or_embedded_page() {
        let by_url: OutboxCollection = serde_json::from_value(json!({
            "type": "OrderedCollection",
            "first": "https://mastodon.social/users/BoD/outbox?page=true"
        }))
        .expect("url form");
        assert_eq!(
            by_url.first.url(),
            "https://mastodon.social/users/BoD/outbox?page=true"
        );

        let embedded: OutboxCollection = serde_json::from_value(json!({
            "type": "OrderedCollection",
            "first": {
                "type": "OrderedCollectionPage",
                "id": "https://example.social/outbox/1",
                "orderedItems": []
            }
        }))
        .expect("object form");
        assert_eq!(embedded.first.url(), "https://example.social/outbox/1");
    }

    #[test]
    fn outbox_items_dispatch_on_type() {
        let page: OutboxPage = serde_json::from_value(json!({
            "orderedItems": [
                {
                    "type": "Create",
                    "object": {
                        "type": "Note",
                        "published": "2025-01-01T09:05:03Z",
                        "content": "<p>Hello</p>",
                        "inReplyTo": null,
                        "attachment": []
                    }
                },
                {
                    "type": "Announce",
                    "object": "https://other.social/users/alice/statuses/1"
                },
                {
                    "type": "Update",
                    "object": { "type": "Note" }
                }
            ]
        }))
        .expect("valid page");

        assert!(matches!(page.ordered_items[0], OutboxItem::Create { .. }));
        assert!(matches!(
            &page.ordered_items[1],
            OutboxItem::Announce { object } if object == "https://other.social/users/alice/statuses/1"
        ));
        assert!(matches!(page.ordered_items[2], OutboxItem::Other));
    }

    #[test]
    fn reply_detection_uses_in_reply_to() {
        let reply: OutboxItem = serde_json::from_value(json!({
            "type": "Create",
            "object": {
                "published": "2025-01-01T09:05:03Z",
                "content": "<p>@bob indeed</p>",
                "inReplyTo": "https://other.social/statuses/9"
            }
        }))
        .expect("valid item");
        assert!(reply.is_reply());

        let announce = OutboxItem::Announce {
            object: "https://other.social/statuses/9".to_string(),
        };
        assert!(!announce.is_reply());
    }
}
