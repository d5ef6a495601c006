//! Remote store access -- existence probes against the snapshot bucket.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_LENGTH;

use crate::error::{Error, Result};
use crate::types::ProbeOutcome;

/// Abstraction over the metadata-only existence check, enabling testability.
///
/// Implementations issue exactly one round trip per call. Transport failures
/// are returned as errors, never folded into [`ProbeOutcome::Missing`]. An
/// object that exists but reports no (or a zero) size is an error too.
#[async_trait::async_trait]
pub trait ArtifactProbe: Send + Sync {
    /// Check whether an object exists at `url`.
    async fn probe(&self, url: &str) -> Result<ProbeOutcome>;
}

/// Production [`ArtifactProbe`] speaking HTTP to the bucket.
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: reqwest::Client,
}

impl HttpStore {
    /// Build a store whose requests each time out after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying HTTP client, shared with the chunk downloader
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl ArtifactProbe for HttpStore {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome> {
        let response = self.client.head(url).send().await?;
        let status = response.status();

        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            tracing::debug!(url = %url, status = status.as_u16(), "probe miss");
            return Ok(ProbeOutcome::Missing {
                status: status.as_u16(),
            });
        }

        // reqwest's content_length() reflects the (empty) HEAD body, so read the header
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            // Zero counts as unknown
            .filter(|&len| len > 0)
            .ok_or_else(|| {
                tracing::error!(url = %url, status = status.as_u16(), "probe hit without usable Content-Length");
                Error::MissingContentLength {
                    url: url.to_string(),
                }
            })?;

        tracing::debug!(url = %url, status = status.as_u16(), content_length, "probe hit");
        Ok(ProbeOutcome::Found { content_length })
    }
}
