//! One Finger exchange: read a request line, resolve, answer, close

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::{Address, render};
use crate::config::FingerConfig;
use crate::federation::ActivityPubClient;
use crate::metrics::FINGER_RESPONSES_TOTAL;
use crate::tasks::TaskScope;

/// Per-connection state machine, shared by every connection
#[derive(Clone)]
pub struct FingerHandler {
    client: ActivityPubClient,
    config: FingerConfig,
}

/// Text sent back to the client, with a label for metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerResponse {
    pub outcome: &'static str,
    pub body: String,
}

impl FingerResponse {
    fn new(outcome: &'static str, body: impl Into<String>) -> Self {
        Self {
            outcome,
            body: body.into(),
        }
    }
}

impl FingerHandler {
    pub fn new(client: ActivityPubClient, config: FingerConfig) -> Self {
        Self { client, config }
    }

    /// Serve one connection
    ///
    /// The stream is shut down and dropped on every path; a client that
    /// sends nothing before the read timeout gets no answer.
    pub async fn handle<S>(&self, stream: S, scope: &TaskScope)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::new(stream);

        let request = match self.read_request(&mut stream).await {
            Some(request) => request,
            None => return,
        };
        tracing::debug!(request = %request, "Finger request");

        let response = self.respond(&request, scope).await;
        FINGER_RESPONSES_TOTAL
            .with_label_values(&[response.outcome])
            .inc();

        if let Err(e) = stream.write_all(response.body.as_bytes()).await {
            tracing::warn!(error = %e, "Failed to write Finger response");
            return;
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(error = %e, "Failed to close Finger connection");
        }
    }

    /// Build the answer to a request line
    pub async fn respond(&self, request: &str, scope: &TaskScope) -> FingerResponse {
        let requested = self.requested_address(request);
        let Some(address) = Address::parse(requested) else {
            return FingerResponse::new("invalid_address", render::INVALID_ADDRESS);
        };

        let Some(href) = self.client.web_finger(&address).await else {
            return FingerResponse::new("user_not_found", render::user_not_found(&address));
        };
        tracing::debug!(%address, href = %href, "Resolved actor");

        let Some(outbox_url) = self.client.outbox_url(&href).await else {
            return FingerResponse::new("user_not_found", render::user_not_found(&address));
        };
        tracing::debug!(%address, outbox_url = %outbox_url, "Resolved outbox");

        let Some(page_url) = self.client.paginated_outbox_url(&outbox_url).await else {
            return FingerResponse::new("user_not_found", render::user_not_found(&address));
        };
        tracing::debug!(%address, page_url = %page_url, "Resolved outbox page");

        let notes = self
            .client
            .outbox(&page_url, self.config.post_limit, scope)
            .await
            .unwrap_or_default();
        if notes.is_empty() {
            return FingerResponse::new("posts_not_found", render::posts_not_found(&address));
        }

        tracing::info!(%address, posts = notes.len(), "Serving posts");
        FingerResponse::new(
            "ok",
            render::posts(&address, &notes, &href, self.config.wrap_width),
        )
    }

    /// Blank requests and the alias select the default address
    fn requested_address<'a>(&'a self, request: &'a str) -> &'a str {
        let request = request.trim();
        if request.is_empty() || request.eq_ignore_ascii_case(self.config.default_address_alias.trim()) {
            &self.config.default_address
        } else {
            request
        }
    }

    /// Read one line of at most `max_request_bytes`
    ///
    /// End of stream counts as an empty request. `None` means the client
    /// timed out or the read failed.
    async fn read_request<S>(&self, stream: &mut BufReader<S>) -> Option<String>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut line = Vec::new();
        let limit = self.config.max_request_bytes as u64;
        let timeout = Duration::from_secs(self.config.read_timeout_seconds);

        let mut limited = (&mut *stream).take(limit);
        let result = tokio::time::timeout(timeout, limited.read_until(b'\n', &mut line)).await;
        match result {
            Ok(Ok(_)) => Some(String::from_utf8_lossy(&line).into_owned()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read Finger request");
                None
            }
            Err(_) => {
                tracing::debug!(
                    timeout_seconds = self.config.read_timeout_seconds,
                    "Finger client sent no request in time"
                );
                None
            }
        }
    }
}
