//! ## Remote Fetcher
//!
//! Retrieves the published parquet files over HTTP and validates that what
//! came back actually is parquet. Content hosts are fond of answering with an
//! HTML redirect or error page under a 200 status; sniffing the 4-byte magic
//! marker up front is what keeps such a page from being handed to the parquet
//! reader as data. Failures are surfaced once; there is no automatic retry.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::exceptions::{TripBoardError, TripBoardResult};

/// Leading bytes of every valid parquet file.
pub const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// How much of an unexpected payload is quoted in a [`TripBoardError::Format`].
const EXCERPT_LEN: usize = 200;

/// Checks that `payload` begins with the parquet magic marker, returning a
/// `Format` error quoting the start of the payload otherwise.
pub fn validate_parquet_magic(url: &str, payload: &[u8]) -> TripBoardResult<()> {
    if payload.len() >= PARQUET_MAGIC.len() && &payload[..PARQUET_MAGIC.len()] == PARQUET_MAGIC {
        return Ok(());
    }
    let end = payload.len().min(EXCERPT_LEN);
    Err(TripBoardError::Format {
        url: url.to_string(),
        excerpt: String::from_utf8_lossy(&payload[..end]).into_owned(),
    })
}

/// HTTP client for the two dataset resources.
///
/// Follows redirects and sends a descriptive user-agent header; the default
/// timeout is generous because the trip file is tens of megabytes.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher with the given timeout and user-agent.
    pub fn new(timeout: Duration, user_agent: &str) -> TripBoardResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(10))
            .build()
            .map_err(|e| {
                TripBoardError::InvalidParameter(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    /// Creates a fetcher from a dashboard configuration.
    pub fn from_config(config: &DashboardConfig) -> TripBoardResult<Self> {
        Self::new(config.timeout, &config.user_agent)
    }

    /// Fetches `url` fully into memory and validates the parquet magic.
    pub async fn fetch(&self, url: &str) -> TripBoardResult<Bytes> {
        debug!(url, "fetching resource");
        let response = self.get_checked(url).await?;
        let body = response.bytes().await.map_err(|e| transport_error(url, e))?;
        validate_parquet_magic(url, &body)?;
        debug!(url, bytes = body.len(), "fetched resource");
        Ok(body)
    }

    /// Streams `url` to `path` chunk by chunk, bounding peak memory to one
    /// chunk, then re-reads the first bytes of the written file to enforce
    /// the same magic contract as [`Fetcher::fetch`].
    pub async fn fetch_to_file(&self, url: &str, path: &Path) -> TripBoardResult<()> {
        debug!(url, path = %path.display(), "streaming resource to file");
        let response = self.get_checked(url).await?;
        let mut stream = response.bytes_stream();
        let mut file = std::fs::File::create(path)?;
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(url, e))?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        file.flush()?;
        drop(file);

        // Post-write integrity check: the file on disk must be parquet.
        let mut head = [0u8; EXCERPT_LEN];
        let mut reader = std::fs::File::open(path)?;
        let n = reader.read(&mut head)?;
        validate_parquet_magic(url, &head[..n])?;
        debug!(url, bytes = written, "streamed resource to file");
        Ok(())
    }

    /// Issues the GET and turns a non-2xx status into a `Network` error
    /// without touching the body.
    async fn get_checked(&self, url: &str) -> TripBoardResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TripBoardError::Network {
                url: url.to_string(),
                status: Some(status.as_u16()),
                detail: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        Ok(response)
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> TripBoardError {
    TripBoardError::Network {
        url: url.to_string(),
        status: err.status().map(|s| s.as_u16()),
        detail: err.to_string(),
    }
}
