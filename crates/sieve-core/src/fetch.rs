//! Fetching subscription configs over HTTP.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SieveError};

/// Default request timeout for config downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An in-flight config download.
#[async_trait]
pub trait ConfResponse: Send {
    /// Raw `Content-Disposition` header, if the server sent one.
    fn content_disposition(&self) -> Option<&str>;

    /// Next chunk of the body, `None` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Something that can start a config download.
#[async_trait]
pub trait ConfFetcher: Send + Sync {
    /// Issues a GET for `url`. Non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<Box<dyn ConfResponse>>;
}

/// [`ConfFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpConfFetcher {
    client: reqwest::Client,
}

impl HttpConfFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sieve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SieveError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

struct HttpConfResponse {
    content_disposition: Option<String>,
    response: reqwest::Response,
}

#[async_trait]
impl ConfResponse for HttpConfResponse {
    fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = self
            .response
            .chunk()
            .await
            .map_err(|e| SieveError::Network(e.to_string()))?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}

#[async_trait]
impl ConfFetcher for HttpConfFetcher {
    async fn fetch(&self, url: &str) -> Result<Box<dyn ConfResponse>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SieveError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SieveError::HttpStatus(status.as_u16()));
        }

        let content_disposition = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Box::new(HttpConfResponse {
            content_disposition,
            response,
        }))
    }
}

/// Reassembles text lines from arbitrarily split byte chunks.
///
/// Lines are split on `\n`, a trailing `\r` is dropped, and invalid UTF-8 is
/// replaced rather than rejected.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Returns the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
