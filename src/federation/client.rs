//! ActivityPub resolution pipeline
//!
//! Turns an address into its latest posts in four steps:
//! WebFinger → actor → outbox → first outbox page. Every step is a single
//! attempt; failures are logged and reported as `None`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, DATE, HOST};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use super::model::{
    ActorDocument, NoteObject, OutboxCollection, OutboxItem, OutboxPage, WebFingerResponse,
};
use super::note::Note;
use super::signature::HttpSigner;
use crate::config::FederationConfig;
use crate::error::AppError;
use crate::finger::Address;
use crate::metrics::{FEDERATION_REQUEST_DURATION_SECONDS, FEDERATION_REQUESTS_TOTAL};
use crate::tasks::TaskScope;

const ACTIVITY_JSON: &str = "application/activity+json";
const JRD_JSON: &str = "application/jrd+json, application/json";

/// Signed ActivityPub client
///
/// Cheap to clone: the HTTP client pools connections internally and the
/// signer is shared.
#[derive(Clone)]
pub struct ActivityPubClient {
    http: reqwest::Client,
    signer: Arc<HttpSigner>,
    scheme: String,
}

impl ActivityPubClient {
    /// Create a client
    ///
    /// # Errors
    /// Returns `AppError::HttpClient` if the HTTP client cannot be built
    pub fn new(config: &FederationConfig, signer: Arc<HttpSigner>) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            signer,
            scheme: config.scheme.clone(),
        })
    }

    /// Step 1: actor URL of `address`, from its WebFinger `self` link
    ///
    /// Unsigned: WebFinger is not part of the signed-request protocol.
    pub async fn web_finger(&self, address: &Address) -> Option<String> {
        let url = match webfinger_url(&self.scheme, address) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(%address, error = %e, "WebFinger URL is not valid");
                return None;
            }
        };

        let response: WebFingerResponse =
            self.fetch_logged("webfinger", url.as_str(), false).await?;
        let href = response.self_href().map(str::to_string);
        if href.is_none() {
            tracing::warn!(%address, "WebFinger response has no self link");
        }
        href
    }

    /// Step 2: outbox URL from the actor document
    pub async fn outbox_url(&self, actor_url: &str) -> Option<String> {
        let actor: ActorDocument = self.fetch_logged("actor", actor_url, true).await?;
        Some(actor.outbox)
    }

    /// Step 3: URL of the outbox's first page
    pub async fn paginated_outbox_url(&self, outbox_url: &str) -> Option<String> {
        let collection: OutboxCollection = self.fetch_logged("outbox", outbox_url, true).await?;
        Some(collection.first.url().to_string())
    }

    /// Step 4: latest posts from an outbox page
    ///
    /// Replies are dropped, then at most `limit` items are kept. Reposts are
    /// fetched concurrently on `scope`; the result keeps page order and
    /// leaves out items that could not be resolved.
    ///
    /// Returns `None` only if the page itself could not be fetched.
    pub async fn outbox(&self, page_url: &str, limit: usize, scope: &TaskScope) -> Option<Vec<Note>> {
        let page: OutboxPage = self.fetch_logged("outbox_page", page_url, true).await?;

        let pending = select_items(page.ordered_items, limit)
            .into_iter()
            .map(|item| match item {
                OutboxItem::Create { object } => Pending::Ready(normalize(object, false)),
                OutboxItem::Announce { object: note_url } => {
                    let client = self.clone();
                    Pending::InFlight(scope.spawn(async move {
                        let object = client.note(&note_url).await?;
                        normalize(object, true)
                    }))
                }
                OutboxItem::Other => Pending::Ready(None),
            })
            .collect();

        Some(join_in_order(pending).await)
    }

    /// Fetch a single note, used to resolve reposts
    pub async fn note(&self, note_url: &str) -> Option<NoteObject> {
        self.fetch_logged("note", note_url, true).await
    }

    async fn fetch_logged<T: DeserializeOwned>(
        &self,
        step: &'static str,
        url: &str,
        signed: bool,
    ) -> Option<T> {
        let timer = FEDERATION_REQUEST_DURATION_SECONDS
            .with_label_values(&[step])
            .start_timer();
        let result = self.fetch_json(url, signed).await;
        timer.observe_duration();

        match result {
            Ok(value) => {
                FEDERATION_REQUESTS_TOTAL
                    .with_label_values(&[step, "ok"])
                    .inc();
                tracing::debug!(step, url, "Federation request succeeded");
                Some(value)
            }
            Err(e) => {
                FEDERATION_REQUESTS_TOTAL
                    .with_label_values(&[step, "error"])
                    .inc();
                tracing::warn!(step, url, error = %e, "Federation request failed");
                None
            }
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str, signed: bool) -> Result<T, AppError> {
        let request = if signed {
            let headers = self.signer.sign_request("GET", url)?;
            self.http
                .get(url)
                .header(ACCEPT, ACTIVITY_JSON)
                .header(HOST, headers.host)
                .header(DATE, headers.date)
                .header("signature", headers.signature)
        } else {
            self.http.get(url).header(ACCEPT, JRD_JSON)
        };

        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

/// WebFinger lookup URL for `address`, with the resource percent-encoded
fn webfinger_url(scheme: &str, address: &Address) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(&format!(
        "{}://{}/.well-known/webfinger",
        scheme,
        address.server()
    ))?;
    url.query_pairs_mut()
        .append_pair("resource", &format!("acct:{}", address.acct()));
    Ok(url)
}

/// Outbox items worth rendering: no replies, no unknown activities, at most
/// `limit` of them, in page order
fn select_items(items: Vec<OutboxItem>, limit: usize) -> Vec<OutboxItem> {
    items
        .into_iter()
        .filter(|item| !matches!(item, OutboxItem::Other) && !item.is_reply())
        .take(limit)
        .collect()
}

fn normalize(object: NoteObject, repost: bool) -> Option<Note> {
    match Note::from_object(object, repost) {
        Ok(note) => Some(note),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unreadable note");
            None
        }
    }
}

/// Result of one outbox item: already known, or still being fetched
enum Pending<T> {
    Ready(Option<T>),
    InFlight(JoinHandle<Option<T>>),
}

/// Await every item in list order, keeping the ones that resolved
///
/// All in-flight fetches are already running, so awaiting them one by one
/// costs no more than the slowest of them.
async fn join_in_order<T>(pending: Vec<Pending<T>>) -> Vec<T> {
    let mut resolved = Vec::with_capacity(pending.len());
    for item in pending {
        let value = match item {
            Pending::Ready(value) => value,
            Pending::InFlight(handle) => match handle.await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(error = %e, "Outbox item task failed");
                    None
                }
            },
        };
        resolved.extend(value);
    }
    resolved
}
