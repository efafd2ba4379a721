//! ActivityPub federation module
//!
//! Handles:
//! - HTTP Signatures for outbound requests
//! - WebFinger (remote lookup and the local account's document)
//! - Actor, outbox and note fetching
//! - Note normalization

mod client;
mod model;
mod note;
mod signature;
mod webfinger;

pub use client::ActivityPubClient;
pub use model::{
    ActorDocument, AttachmentObject, NoteObject, OutboxCollection, OutboxItem, OutboxPage,
    Reference, WebFingerLink, WebFingerResponse,
};
pub use note::{Note, format_published, html_to_text};
pub use signature::{
    HttpSigner, ParsedSignature, SIGNED_HEADERS, SignatureHeaders, http_date,
    parse_signature_header, signing_string, verify_signature,
};
pub use webfinger::{actor_url, generate_webfinger_response, resource_matches};
