//! HTTP retrieval of feed documents for the command line tool.
//!
//! The parser never touches the network; this is the transport layer that
//! owns timeouts, size limits and retries.

use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::util::{validate_feed_url, UrlValidationError};

/// Errors that can occur while downloading a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL was rejected before any request was made
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Limits applied to a single feed download.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum accepted body size in bytes.
    pub max_bytes: usize,
    /// Retries after a 429, a 5xx or a truncated body.
    pub max_retries: u32,
    /// First backoff delay; doubled on every retry.
    pub backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Downloads the feed document at `url`.
///
/// # Behavior
///
/// - Rate limiting (HTTP 429) and server errors (5xx) are retried with
///   exponential backoff, up to `max_retries` times
/// - Other non-2xx statuses fail immediately
/// - Bodies larger than `max_bytes` are rejected, using Content-Length when present
/// - Bodies shorter than their Content-Length are retried
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    let url = validate_feed_url(url)?;
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(options.timeout, client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        let retryable = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= options.max_retries {
                return Err(FetchError::RateLimited(options.max_retries));
            }
            true
        } else if status.is_server_error() {
            if retry_count >= options.max_retries {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
            true
        } else if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        } else {
            false
        };

        if !retryable {
            match read_limited_bytes(response, options.max_bytes).await {
                Ok(bytes) => {
                    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed");
                    return Ok(bytes);
                }
                Err(FetchError::IncompleteResponse { expected, received })
                    if retry_count < options.max_retries =>
                {
                    tracing::debug!(
                        url = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                }
                Err(e) => return Err(e),
            }
        } else {
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                "Retrying feed request"
            );
        }

        let delay = options
            .backoff
            .saturating_mul(2u32.saturating_pow(retry_count));
        tokio::time::sleep(delay).await;
        retry_count += 1;
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
