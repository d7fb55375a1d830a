//! Media fetching through an ordered chain of providers.
//!
//! # Architecture
//!
//! - [`MediaProvider`] - Async trait that individual providers implement
//! - [`MediaFetcher`] - Priority-ordered provider chain with fallback loop
//! - [`TikwmProvider`] - Primary provider backed by the tikwm HTTP API
//! - [`YtDlpProvider`] - Fallback provider running the `yt-dlp` program
//!
//! The first provider to succeed wins and its [`ProviderTag`] is recorded as
//! the media's provenance. Provenance is used for reporting only.

mod error;
mod registry;
mod tikwm;
mod ytdlp;

pub use error::{FetchError, ProviderError, ProviderFailure};
pub use registry::{Fetched, MediaFetcher};
pub use tikwm::{DEFAULT_TIKWM_URL, TikwmProvider};
pub use ytdlp::{DEFAULT_YTDLP_PROGRAM, YtDlpProvider, YtDlpReport, parse_ytdlp_output};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::parser::MediaReference;

/// Which provider tier satisfied a fetch.
///
/// Derives `Ord` so that `Primary < Fallback` for sorting (try primary first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderTag {
    /// Preferred provider.
    Primary = 0,
    /// Provider used only after the primary route failed.
    Fallback = 1,
}

/// A media file fetched into the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    /// Path of the downloaded file, rooted at the fetch destination directory.
    pub local_path: PathBuf,
    /// Handle of the video's author, without a leading `@`.
    pub author_handle: String,
    /// Creation time of the video as Unix seconds.
    pub created_at_unix_seconds: i64,
    /// Provider tier that produced this file.
    pub provenance: ProviderTag,
}

/// Trait that all media providers implement.
///
/// Uses `async_trait` so providers can be stored as `Box<dyn MediaProvider>`
/// in the fetcher chain.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Returns the provider's name (e.g., "tikwm", "yt-dlp").
    fn name(&self) -> &str;

    /// Returns the provider's tier.
    fn tag(&self) -> ProviderTag;

    /// Downloads the referenced video into `destination`.
    async fn fetch(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<FetchedMedia, ProviderError>;
}

/// Builds the standard chain: tikwm as Primary, yt-dlp as Fallback.
#[must_use]
pub fn default_fetcher(tikwm: TikwmProvider, ytdlp: YtDlpProvider) -> MediaFetcher {
    let mut fetcher = MediaFetcher::new();
    fetcher.register(Box::new(tikwm));
    fetcher.register(Box::new(ytdlp));
    fetcher
}

/// Returns a short random token for collision-resistant scratch file names.
#[must_use]
pub(crate) fn scratch_nonce() -> String {
    let mut nonce = Uuid::new_v4().simple().to_string();
    nonce.truncate(12);
    nonce
}
