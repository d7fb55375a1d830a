//! Thumbnail generation: a mid-point frame, scaled into a small box.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::{MediaError, MediaTools};

/// Bounding box the thumbnail is fitted into, aspect ratio preserved.
pub const THUMBNAIL_BOX: &str = "320x320";

/// The two scratch files a thumbnail run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Full-size extracted frame, `<video>_big.png`.
    pub frame_path: PathBuf,
    /// Scaled image attached to the upload, `<video>.jpg`.
    pub image_path: PathBuf,
}

impl Thumbnail {
    /// Derives both thumbnail paths from the video path.
    #[must_use]
    pub fn for_video(video: &Path) -> Self {
        Self {
            frame_path: with_suffix(video, "_big.png"),
            image_path: with_suffix(video, ".jpg"),
        }
    }

    /// Both artifact paths, frame first.
    #[must_use]
    pub fn artifacts(&self) -> [&Path; 2] {
        [&self.frame_path, &self.image_path]
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Formats a seek offset as `HH:MM:SS.mmm`.
#[must_use]
pub fn format_seek(offset: Duration) -> String {
    let total_ms = offset.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Produces thumbnails from the middle of a video.
#[derive(Clone)]
pub struct ThumbnailGenerator {
    tools: Arc<dyn MediaTools>,
}

impl ThumbnailGenerator {
    /// Creates a generator using `tools`.
    #[must_use]
    pub fn new(tools: Arc<dyn MediaTools>) -> Self {
        Self { tools }
    }

    /// Extracts the frame at `duration_seconds / 2` and scales it into
    /// [`THUMBNAIL_BOX`].
    ///
    /// # Errors
    ///
    /// Returns [`MediaError`] if either the extraction or the resize fails.
    /// Files written before the failure are left for the caller to clean up.
    #[instrument(skip(self), fields(video = %video.display()))]
    pub async fn generate(
        &self,
        video: &Path,
        duration_seconds: f64,
    ) -> Result<Thumbnail, MediaError> {
        let thumbnail = Thumbnail::for_video(video);
        let midpoint = Duration::try_from_secs_f64(duration_seconds / 2.0).unwrap_or_default();

        debug!(seek = %format_seek(midpoint), "Extracting thumbnail frame");
        self.tools
            .extract_frame(video, midpoint, &thumbnail.frame_path)
            .await?;
        self.tools
            .resize_image(&thumbnail.frame_path, THUMBNAIL_BOX, &thumbnail.image_path)
            .await?;

        Ok(thumbnail)
    }
}

impl std::fmt::Debug for ThumbnailGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailGenerator").finish_non_exhaustive()
    }
}
