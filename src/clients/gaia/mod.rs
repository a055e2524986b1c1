use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http::header;
use serde_json::Value;
use thiserror::Error;

use crate::repos::config::{
    get_gaia_api_key, get_gaia_base_url, get_gaia_default_model,
};

pub mod chat_completions;
pub mod stream;
#[cfg(test)]
pub(crate) mod testing;

/// Failure surfaced by the relay layer. Transport- and status-level problems
/// are caught here, decorated with whatever diagnostics the upstream gave us,
/// and propagated; nothing is retried.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Gaia API key is not configured")]
    MissingApiKey,
    #[error("Gaia API Error: {status} - {details}")]
    UpstreamStatus { status: u16, details: Value },
    #[error("Failed to send request to Gaia API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RelayError {
    /// HTTP status attached to the failure, if the upstream got far enough to
    /// give us one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RelayError::UpstreamStatus { status, .. } => Some(*status),
            RelayError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Resolved upstream provider settings for one relay invocation.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
}

impl ProviderConfig {
    pub fn from_settings() -> Self {
        ProviderConfig {
            base_url: get_gaia_base_url(),
            api_key: get_gaia_api_key(),
            default_model: get_gaia_default_model(),
        }
    }
}

/// A buffered upstream reply.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// An upstream reply whose body is consumed incrementally. The stream is
/// live: nothing is buffered beyond what the transport has already handed us.
pub struct UpstreamEventStream {
    pub status: u16,
    pub bytes: BoxStream<'static, Result<Bytes, RelayError>>,
}

impl std::fmt::Debug for UpstreamEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamEventStream")
            .field("status", &self.status)
            .field("bytes", &"<stream>")
            .finish()
    }
}

/// Seam between the relay and the network, so tests can substitute a stub
/// and count outbound calls.
pub trait ChatTransport {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<TransportResponse, RelayError>;

    async fn post_json_stream(
        &self,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<UpstreamEventStream, RelayError>;

    async fn get_json(&self, url: &str, api_key: &str) -> Result<TransportResponse, RelayError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
        }
    }
}

impl ChatTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<TransportResponse, RelayError> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }

    async fn post_json_stream(
        &self,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<UpstreamEventStream, RelayError> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes_stream().map_err(RelayError::from).boxed();
        Ok(UpstreamEventStream { status, bytes })
    }

    async fn get_json(&self, url: &str, api_key: &str) -> Result<TransportResponse, RelayError> {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}
