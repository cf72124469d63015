use super::errors::FetchError;
use crate::bridge::payload::{Payload, PayloadKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stable identifier of a monitored endpoint (`health`, `status`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(Arc<str>);

impl EndpointId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One monitored source: where to find it and how to decode what it returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    id: EndpointId,
    path: String,
    kind: PayloadKind,
}

impl EndpointSpec {
    #[must_use]
    pub fn new(id: impl Into<EndpointId>, path: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            kind,
        }
    }

    /// The bridge's connectivity and buffer report at `/health`
    #[must_use]
    pub fn health() -> Self {
        Self::new("health", "/health", PayloadKind::Health)
    }

    /// The bridge's process counters at `/status`
    #[must_use]
    pub fn status() -> Self {
        Self::new("status", "/status", PayloadKind::Status)
    }

    #[must_use]
    pub const fn id(&self) -> &EndpointId {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        self.kind
    }
}

/// Performs one request against one endpoint.
///
/// Implementations return their result to the caller and never touch shared
/// engine state. When `cancel` fires they must resolve with
/// `FetchError::Cancelled` rather than a transport error.
#[async_trait]
pub trait EndpointFetcher: Send + Sync {
    async fn fetch(
        &self,
        endpoint: &EndpointSpec,
        cancel: &CancellationToken,
    ) -> Result<Payload, FetchError>;
}

/// Fetches endpoints over HTTP relative to the bridge's base URL
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn url_for(&self, endpoint: &EndpointSpec) -> String {
        let path = endpoint.path();
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn request(&self, endpoint: &EndpointSpec) -> Result<Payload, FetchError> {
        let url = self.url_for(endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(
                status.as_u16(),
                format!("GET {url} returned {status}"),
            ));
        }

        let body = response.bytes().await.map_err(|e| transport_error(&e))?;
        endpoint.kind().decode(&body)
    }
}

fn transport_error(e: &reqwest::Error) -> FetchError {
    let message = if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    FetchError::Transport {
        status_code: e.status().map(|s| s.as_u16()),
        message,
    }
}

#[async_trait]
impl EndpointFetcher for HttpFetcher {
    async fn fetch(
        &self,
        endpoint: &EndpointSpec,
        cancel: &CancellationToken,
    ) -> Result<Payload, FetchError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("🛑 Fetch of {} cancelled", endpoint.id());
                Err(FetchError::Cancelled)
            }
            result = self.request(endpoint) => result,
        }
    }
}
