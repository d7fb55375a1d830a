//! yt-dlp provider - fallback that shells out to the `yt-dlp` program.
//!
//! yt-dlp is run with `-J --no-simulate`, so it downloads the video *and*
//! prints a single JSON document describing it. The document is the only
//! source of the author handle, timestamp and written file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{FetchedMedia, MediaProvider, ProviderError, ProviderTag, scratch_nonce};
use crate::parser::MediaReference;
use crate::process::ProcessRunner;

const PROVIDER_NAME: &str = "yt-dlp";

/// Default program name, resolved through `PATH`.
pub const DEFAULT_YTDLP_PROGRAM: &str = "yt-dlp";

/// Subset of the yt-dlp info JSON we rely on.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    requested_downloads: Vec<YtDlpDownload>,
}

#[derive(Debug, Deserialize)]
struct YtDlpDownload {
    #[serde(rename = "_filename")]
    filename: Option<String>,
    #[serde(default)]
    filepath: Option<String>,
}

/// What yt-dlp reported about a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpReport {
    /// File name as printed by yt-dlp (relative to its working directory or absolute).
    pub filename: PathBuf,
    /// Author handle, `creator` preferred over `uploader`.
    pub author_handle: String,
    /// Upload time as Unix seconds (0 when unknown).
    pub created_at_unix_seconds: i64,
}

/// Parses the JSON document yt-dlp prints with `-J`.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] if the output is not JSON or
/// does not describe exactly one downloaded file.
pub fn parse_ytdlp_output(stdout: &str) -> Result<YtDlpReport, ProviderError> {
    let info: YtDlpInfo = serde_json::from_str(stdout.trim()).map_err(|e| {
        ProviderError::invalid_response(PROVIDER_NAME, format!("malformed JSON: {e}"))
    })?;

    if info.requested_downloads.len() != 1 {
        return Err(ProviderError::invalid_response(
            PROVIDER_NAME,
            format!(
                "expected exactly one requested download, got {}",
                info.requested_downloads.len()
            ),
        ));
    }

    let download = &info.requested_downloads[0];
    let filename = download
        .filepath
        .as_deref()
        .or(download.filename.as_deref())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ProviderError::invalid_response(PROVIDER_NAME, "requested download has no file name")
        })?;

    let author_handle = info
        .creator
        .filter(|c| !c.is_empty())
        .or(info.uploader)
        .unwrap_or_default();

    Ok(YtDlpReport {
        filename: PathBuf::from(filename),
        author_handle,
        created_at_unix_seconds: info.timestamp.unwrap_or(0),
    })
}

/// Fallback provider running `yt-dlp` inside the destination directory.
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    program: PathBuf,
    runner: ProcessRunner,
}

impl YtDlpProvider {
    /// Creates a provider using `program` (e.g. `yt-dlp` or an absolute path).
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn args(reference: &MediaReference) -> Vec<String> {
        vec![
            "-J".to_string(),
            "--no-simulate".to_string(),
            "--no-progress".to_string(),
            "-o".to_string(),
            format!("{}_%(id)s.%(ext)s", scratch_nonce()),
            reference.as_url().to_string(),
        ]
    }
}

impl Default for YtDlpProvider {
    fn default() -> Self {
        Self::new(DEFAULT_YTDLP_PROGRAM, ProcessRunner::new())
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn tag(&self) -> ProviderTag {
        ProviderTag::Fallback
    }

    #[tracing::instrument(skip(self, reference), fields(provider = "yt-dlp", reference = %reference))]
    async fn fetch(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<FetchedMedia, ProviderError> {
        let output = self
            .runner
            .run(&self.program, Self::args(reference), Some(destination))
            .await?;

        let report = parse_ytdlp_output(&output.stdout_lossy())?;
        // Path::join keeps absolute names as they are.
        let local_path = destination.join(&report.filename);
        debug!(path = %local_path.display(), author = %report.author_handle, "yt-dlp download complete");

        Ok(FetchedMedia {
            local_path,
            author_handle: report.author_handle,
            created_at_unix_seconds: report.created_at_unix_seconds,
            provenance: ProviderTag::Fallback,
        })
    }
}
