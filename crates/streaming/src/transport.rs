use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::protocol::SimulationRequest;

/// Response body of one run, as raw chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Longest error body kept from a non-success response.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (refused, DNS, TLS...).
    Connect(String),
    /// The backend answered with a non-success status.
    Status { code: u16, body: String },
    /// The body broke off while streaming.
    Body(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "could not reach simulation backend: {msg}"),
            TransportError::Status { code, body } if body.is_empty() => {
                write!(f, "simulation backend returned HTTP {code}")
            }
            TransportError::Status { code, body } => {
                write!(f, "simulation backend returned HTTP {code}: {body}")
            }
            TransportError::Body(msg) => write!(f, "simulation stream interrupted: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Opens the response body for a run.
///
/// Dropping the returned stream must abort the underlying read.
pub trait Transport: Send + Sync {
    fn open(&self, request: &SimulationRequest)
    -> BoxFuture<'static, Result<ByteStream, TransportError>>;
}

/// POSTs the request as JSON and streams the response body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn open(
        &self,
        request: &SimulationRequest,
    ) -> BoxFuture<'static, Result<ByteStream, TransportError>> {
        let pending = self.client.post(&self.endpoint).json(request).send();
        let endpoint = self.endpoint.clone();
        async move {
            let resp = pending
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let mut body = resp.text().await.unwrap_or_default();
                truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
                return Err(TransportError::Status {
                    code: status.as_u16(),
                    body,
                });
            }
            info!(%endpoint, status = status.as_u16(), "simulation stream opened");
            let body = resp
                .bytes_stream()
                .inspect_ok(|chunk| debug!(bytes = chunk.len(), "stream chunk"))
                .map_err(|e| TransportError::Body(e.to_string()));
            Ok(body.boxed())
        }
        .boxed()
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::{TransportError, truncate_at_char_boundary};

    #[test]
    fn status_error_mentions_body_when_present() {
        let bare = TransportError::Status {
            code: 502,
            body: String::new(),
        };
        assert_eq!(bare.to_string(), "simulation backend returned HTTP 502");

        let with_body = TransportError::Status {
            code: 422,
            body: "missing user_input".to_string(),
        };
        assert!(with_body.to_string().ends_with("missing user_input"));
    }

    #[test]
    fn truncation_respects_utf8() {
        let mut s = "₹₹₹".to_string();
        truncate_at_char_boundary(&mut s, 4);
        assert_eq!(s, "₹");
    }
}
