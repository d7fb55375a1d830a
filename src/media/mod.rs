//! Media inspection and conversion through external tools.
//!
//! # Architecture
//!
//! - [`MediaTools`] - Async trait over the four tool operations the relay needs
//! - [`FfmpegTools`] - Implementation running `ffprobe`, `ffmpeg` and `convert`
//! - [`TranscodePolicy`] - Size-threshold re-encode decision
//! - [`ThumbnailGenerator`] - Mid-point frame scaled to 320x320
//!
//! The trait exists so the pipeline and uploader can be driven by in-memory
//! fakes in tests.

mod error;
mod probe;
mod thumbnail;
mod transcode;

pub use error::MediaError;
pub use probe::{MediaMetadata, parse_probe_output, probe_args};
pub use thumbnail::{THUMBNAIL_BOX, Thumbnail, ThumbnailGenerator, format_seek};
pub use transcode::{
    DEFAULT_TRANSCODE_THRESHOLD_BYTES, TRANSCODED_SUFFIX, TranscodeOutcome, TranscodePolicy,
    transcoded_path,
};

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::process::ProcessRunner;

/// Metadata tag written into every re-encoded file.
pub const ENCODE_METADATA: &str = "source_link=t.me/by_meh";

/// Operations on media files that need external programs.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Reads dimensions and duration of `video`.
    async fn probe(&self, video: &Path) -> Result<MediaMetadata, MediaError>;

    /// Re-encodes `input` to H.264 video + AAC audio at `output`, overwriting it.
    async fn encode_compatible(&self, input: &Path, output: &Path) -> Result<(), MediaError>;

    /// Writes the single frame at offset `at` of `video` to `output`.
    async fn extract_frame(
        &self,
        video: &Path,
        at: Duration,
        output: &Path,
    ) -> Result<(), MediaError>;

    /// Scales `input` to fit `bounding_box` (e.g. `320x320`) and writes `output`.
    async fn resize_image(
        &self,
        input: &Path,
        bounding_box: &str,
        output: &Path,
    ) -> Result<(), MediaError>;
}

/// Program paths for the external tools.
///
/// Bare names are resolved through `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolPaths {
    /// `ffprobe` program.
    pub ffprobe: PathBuf,
    /// `ffmpeg` program.
    pub ffmpeg: PathBuf,
    /// ImageMagick `convert` program.
    pub convert: PathBuf,
    /// `yt-dlp` program.
    pub yt_dlp: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
            convert: PathBuf::from("convert"),
            yt_dlp: PathBuf::from(crate::fetch::DEFAULT_YTDLP_PROGRAM),
        }
    }
}

/// [`MediaTools`] backed by ffprobe, ffmpeg and ImageMagick.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    paths: ToolPaths,
    runner: ProcessRunner,
}

impl FfmpegTools {
    /// Creates the tool set.
    #[must_use]
    pub fn new(paths: ToolPaths, runner: ProcessRunner) -> Self {
        Self { paths, runner }
    }

    fn encode_args<'a>(input: &'a Path, output: &'a Path) -> Vec<&'a OsStr> {
        let mut args: Vec<&OsStr> = vec![OsStr::new("-i"), input.as_os_str()];
        args.extend(
            [
                "-vcodec",
                "libx264",
                "-acodec",
                "aac",
                "-y",
                "-preset",
                "fast",
                "-metadata",
                ENCODE_METADATA,
            ]
            .map(OsStr::new),
        );
        args.push(output.as_os_str());
        args
    }
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new(ToolPaths::default(), ProcessRunner::new())
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    #[tracing::instrument(level = "debug", skip(self), fields(video = %video.display()))]
    async fn probe(&self, video: &Path) -> Result<MediaMetadata, MediaError> {
        let output = self
            .runner
            .run(&self.paths.ffprobe, probe_args(video), None)
            .await?;
        parse_probe_output(video, &output.stdout)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(input = %input.display()))]
    async fn encode_compatible(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        self.runner
            .run(&self.paths.ffmpeg, Self::encode_args(input, output), None)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(video = %video.display()))]
    async fn extract_frame(
        &self,
        video: &Path,
        at: Duration,
        output: &Path,
    ) -> Result<(), MediaError> {
        let seek = format_seek(at);
        let args: [&OsStr; 7] = [
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-ss"),
            OsStr::new(&seek),
            OsStr::new("-vframes"),
            OsStr::new("1"),
            output.as_os_str(),
        ];
        self.runner.run(&self.paths.ffmpeg, args, None).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(input = %input.display()))]
    async fn resize_image(
        &self,
        input: &Path,
        bounding_box: &str,
        output: &Path,
    ) -> Result<(), MediaError> {
        let args: [&OsStr; 4] = [
            input.as_os_str(),
            OsStr::new("-resize"),
            OsStr::new(bounding_box),
            output.as_os_str(),
        ];
        self.runner.run(&self.paths.convert, args, None).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_args_order() {
        let args = FfmpegTools::encode_args(Path::new("in.mp4"), Path::new("in.mp4.h264.mp4"));
        let rendered: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            rendered,
            vec![
                "-i",
                "in.mp4",
                "-vcodec",
                "libx264",
                "-acodec",
                "aac",
                "-y",
                "-preset",
                "fast",
                "-metadata",
                "source_link=t.me/by_meh",
                "in.mp4.h264.mp4",
            ]
        );
    }

    #[test]
    fn test_tool_paths_partial_json() {
        let paths: ToolPaths = serde_json::from_str(r#"{"ffmpeg":"/opt/ffmpeg/bin/ffmpeg"}"#).unwrap();
        assert_eq!(paths.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(paths.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(paths.yt_dlp, PathBuf::from("yt-dlp"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_with_fake_ffprobe() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffprobe");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '{\"streams\":[{\"width\":720,\"height\":1280}],\"format\":{\"duration\":\"9.5\"}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tools = FfmpegTools::new(
            ToolPaths {
                ffprobe: script,
                ..ToolPaths::default()
            },
            ProcessRunner::new(),
        );
        let meta = tools.probe(Path::new("whatever.mp4")).await.unwrap();
        assert_eq!((meta.width_px, meta.height_px), (720, 1280));
        assert_eq!(meta.whole_seconds(), 9);
    }

    #[tokio::test]
    async fn test_missing_program_maps_to_process_error() {
        let tools = FfmpegTools::new(
            ToolPaths {
                convert: PathBuf::from("no-such-convert-ttrelay"),
                ..ToolPaths::default()
            },
            ProcessRunner::new(),
        );
        let err = tools
            .resize_image(Path::new("a.png"), THUMBNAIL_BOX, Path::new("a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Process(_)), "got: {err:?}");
    }
}
