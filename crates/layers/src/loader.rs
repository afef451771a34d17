//! Fetching geometry documents from URLs or the local disk.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    Io { location: String, message: String },
    Http { location: String, message: String },
    Status { location: String, code: u16 },
    Json { location: String, message: String },
    /// The document loaded but is not a usable track collection.
    Document(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { location, message } => write!(f, "read {location}: {message}"),
            LoadError::Http { location, message } => write!(f, "fetch {location}: {message}"),
            LoadError::Status { location, code } => {
                write!(f, "fetch {location}: unexpected status {code}")
            }
            LoadError::Json { location, message } => {
                write!(f, "parse {location}: {message}")
            }
            LoadError::Document(msg) => write!(f, "bad geometry document: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Source of geometry documents for overlay builds.
pub trait GeometryLoader: Send + Sync {
    fn load(&self, location: &str) -> BoxFuture<'static, Result<Value, LoadError>>;
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Loads `http(s)://` locations over HTTP and everything else from disk.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    client: reqwest::Client,
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl GeometryLoader for DocumentLoader {
    fn load(&self, location: &str) -> BoxFuture<'static, Result<Value, LoadError>> {
        let location = location.to_string();
        if is_remote(&location) {
            let client = self.client.clone();
            async move {
                debug!(%location, "fetching geometry document");
                let http = |e: reqwest::Error| LoadError::Http {
                    location: location.clone(),
                    message: e.to_string(),
                };
                let resp = client.get(&location).send().await.map_err(http)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(LoadError::Status {
                        location: location.clone(),
                        code: status.as_u16(),
                    });
                }
                let body = resp.bytes().await.map_err(http)?;
                parse_document(&location, &body)
            }
            .boxed()
        } else {
            async move {
                debug!(%location, "reading geometry document");
                let body = tokio::fs::read(&location)
                    .await
                    .map_err(|e| LoadError::Io {
                        location: location.clone(),
                        message: e.to_string(),
                    })?;
                parse_document(&location, &body)
            }
            .boxed()
        }
    }
}

fn parse_document(location: &str, body: &[u8]) -> Result<Value, LoadError> {
    serde_json::from_slice(body).map_err(|e| LoadError::Json {
        location: location.to_string(),
        message: e.to_string(),
    })
}
