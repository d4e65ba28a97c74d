//! HTTP transport for model downloads
//!
//! The fetcher only sees a length hint and a stream of byte chunks, so tests
//! can feed it bodies from memory.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use common::error::{Error, Result};

/// Body of a response as it arrives off the wire
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// An opened download
pub struct Download {
    /// Value of the `Content-Length` header, if the server sent one
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

/// Opens a streamed GET request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, verify_tls: bool) -> Result<Download>;
}

/// `reqwest` backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    user_agent: String,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            user_agent: format!("onprem/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransport {
    /// Creates a transport identifying itself as `onprem/<version>`
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, verify_tls: bool) -> Result<Client> {
        if !verify_tls {
            warn!("TLS certificate verification is disabled for this download");
        }
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::Download(format!("failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, verify_tls: bool) -> Result<Download> {
        let client = self.client(verify_tls)?;

        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Download(format!("request to {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::Download(format!(
                "Failed to download {}: HTTP {}",
                url,
                resp.status()
            )));
        }

        let content_length = resp.content_length();
        debug!("GET {} -> {:?} bytes announced", url, content_length);

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Download(format!("connection interrupted: {}", e))))
            .boxed();

        Ok(Download {
            content_length,
            body,
        })
    }
}
