// logtail - app/transport.rs
//
// How the primary talks to a peer. The aggregator only sees the
// `PeerTransport` trait, so tests substitute in-process stubs and the real
// implementation can change wire format without touching fan-out logic.
//
// Failure classification (HttpTransport):
//   - request timed out                    -> PeerFailure::Timeout
//   - connect / send failure               -> PeerFailure::Unreachable
//   - non-2xx status                       -> PeerFailure::BadResponse { status }
//   - 2xx with a body that does not decode -> PeerFailure::BadResponse { status }

use crate::core::model::{LogFileInfo, LogListing, PeerDescriptor, RetrievalQuery, TailResponse};
use crate::util::error::PeerFailure;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error-body excerpt carried into a `BadResponse` reason.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Remote operations the primary can ask of a peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Ask `peer` to run its local tail with `query`. Lines oldest-first.
    async fn fetch_tail(
        &self,
        peer: &PeerDescriptor,
        query: &RetrievalQuery,
    ) -> Result<Vec<String>, PeerFailure>;

    /// Ask `peer` for the files it can serve.
    async fn list_files(&self, peer: &PeerDescriptor) -> Result<Vec<LogFileInfo>, PeerFailure>;

    /// Succeeds when `peer` reports itself healthy.
    async fn check_health(&self, peer: &PeerDescriptor) -> Result<(), PeerFailure>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// `PeerTransport` over the node HTTP surface.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport whose requests give up after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            request_timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> PeerFailure {
        if err.is_timeout() {
            PeerFailure::Timeout {
                after: self.request_timeout,
            }
        } else if err.is_decode() || err.is_body() {
            PeerFailure::BadResponse {
                status: err.status().map(|s| s.as_u16()),
                reason: err.to_string(),
            }
        } else {
            PeerFailure::Unreachable {
                reason: err.to_string(),
            }
        }
    }

    async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Response, PeerFailure> {
        self.http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(e))
    }

    /// Check status, then decode the JSON body.
    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, PeerFailure> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PeerFailure::BadResponse {
                status: Some(status.as_u16()),
                reason: excerpt(&body),
            });
        }
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        serde_json::from_slice(&bytes).map_err(|e| PeerFailure::BadResponse {
            status: Some(status.as_u16()),
            reason: format!("malformed response body: {e}"),
        })
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn fetch_tail(
        &self,
        peer: &PeerDescriptor,
        query: &RetrievalQuery,
    ) -> Result<Vec<String>, PeerFailure> {
        let mut params = vec![
            ("filename", query.source_identifier().to_string()),
            ("entries", query.line_limit().to_string()),
        ];
        if let Some(keyword) = query.keyword() {
            params.push(("keyword", keyword.to_string()));
        }

        let response = self.get(&peer.endpoint("/logs"), &params).await?;
        let body: TailResponse = self.decode(response).await?;

        let mut entries = body.entries;
        if entries.len() > query.line_limit() {
            tracing::warn!(
                peer = %peer.name,
                returned = entries.len(),
                limit = query.line_limit(),
                "Peer returned more lines than requested; keeping the newest"
            );
            entries.drain(..entries.len() - query.line_limit());
        }
        Ok(entries)
    }

    async fn list_files(&self, peer: &PeerDescriptor) -> Result<Vec<LogFileInfo>, PeerFailure> {
        let response = self.get(&peer.endpoint("/logs/list"), &[]).await?;
        let listing: LogListing = self.decode(response).await?;
        Ok(listing.files)
    }

    async fn check_health(&self, peer: &PeerDescriptor) -> Result<(), PeerFailure> {
        let response = self.get(&peer.endpoint("/health"), &[]).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PeerFailure::BadResponse {
                status: Some(status.as_u16()),
                reason: "health check failed".to_string(),
            })
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
