//! tikwm provider - downloads videos through the tikwm HTTP API.
//!
//! The [`TikwmProvider`] posts the reference to `{base}/api/`, reads the JSON
//! envelope and streams the `play` URL into the destination directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use url::Url;

use super::{FetchedMedia, MediaProvider, ProviderError, ProviderTag, scratch_nonce};
use crate::parser::MediaReference;

/// Default tikwm API base URL.
pub const DEFAULT_TIKWM_URL: &str = "https://www.tikwm.com";

const PROVIDER_NAME: &str = "tikwm";

// ==================== tikwm API Response Types ====================

/// Top-level tikwm API envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct TikwmResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<TikwmVideo>,
}

/// The `data` field of a successful tikwm response.
#[derive(Debug, Deserialize)]
pub(crate) struct TikwmVideo {
    pub id: String,
    pub play: String,
    pub author: TikwmAuthor,
    #[serde(default)]
    pub create_time: i64,
}

/// Author entry of a tikwm video.
#[derive(Debug, Deserialize)]
pub(crate) struct TikwmAuthor {
    pub unique_id: String,
}

// ==================== TikwmProvider ====================

/// Primary provider backed by the tikwm HTTP API.
pub struct TikwmProvider {
    client: Client,
    base_url: String,
}

impl TikwmProvider {
    /// Creates a provider talking to the public tikwm instance.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_TIKWM_URL)
    }

    /// Creates a provider with a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn api_url(&self) -> String {
        format!("{}/api/", self.base_url)
    }

    /// Turns the `play` field into an absolute URL; tikwm sometimes answers
    /// with a path relative to its own host.
    fn media_url(&self, play: &str) -> Result<String, ProviderError> {
        if let Ok(url) = Url::parse(play) {
            return Ok(url.to_string());
        }
        let base = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| ProviderError::invalid_response(PROVIDER_NAME, e.to_string()))?;
        base.join(play)
            .map(|url| url.to_string())
            .map_err(|e| {
                ProviderError::invalid_response(PROVIDER_NAME, format!("bad play URL '{play}': {e}"))
            })
    }

    async fn lookup(&self, reference: &MediaReference) -> Result<TikwmVideo, ProviderError> {
        let api_url = self.api_url();
        debug!(api_url = %api_url, "Calling tikwm API");

        let response = self
            .client
            .post(&api_url)
            .form(&[("url", reference.as_url()), ("hd", "1")])
            .send()
            .await
            .map_err(|e| ProviderError::network(&api_url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::http_status(&api_url, status.as_u16()));
        }

        let body: TikwmResponse = response.json().await.map_err(|e| {
            ProviderError::invalid_response(PROVIDER_NAME, format!("malformed JSON: {e}"))
        })?;

        if body.code != 0 {
            return Err(ProviderError::rejected(
                PROVIDER_NAME,
                reference.as_url(),
                &body.msg,
            ));
        }

        body.data
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER_NAME, "response has no data"))
    }

    async fn download(&self, url: &str, target: &Path) -> Result<u64, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::network(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::http_status(url, status.as_u16()));
        }

        let file = File::create(target)
            .await
            .map_err(|e| ProviderError::io(target, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProviderError::network(url, &e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| ProviderError::io(target, e))?;
            written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| ProviderError::io(target, e))?;
        Ok(written)
    }
}

impl std::fmt::Debug for TikwmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TikwmProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MediaProvider for TikwmProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Primary
    }

    #[tracing::instrument(skip(self, reference), fields(provider = "tikwm", reference = %reference))]
    async fn fetch(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<FetchedMedia, ProviderError> {
        let video = self.lookup(reference).await?;
        let media_url = self.media_url(&video.play)?;
        let target = scratch_path(destination, &video.id);

        match self.download(&media_url, &target).await {
            Ok(bytes) => {
                debug!(path = %target.display(), bytes, "tikwm download complete");
                Ok(FetchedMedia {
                    local_path: target,
                    author_handle: video.author.unique_id,
                    created_at_unix_seconds: video.create_time,
                    provenance: ProviderTag::Primary,
                })
            }
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&target).await
                    && e.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %target.display(), error = %e, "Failed to remove partial download");
                }
                Err(err)
            }
        }
    }
}

/// Builds `<destination>/tikwm_<id>_<nonce>.mp4`, keeping only safe id characters.
fn scratch_path(destination: &Path, id: &str) -> PathBuf {
    let safe_id: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    destination.join(format!("{PROVIDER_NAME}_{safe_id}_{}.mp4", scratch_nonce()))
}
