//! ffprobe output parsing.

use std::path::Path;

use serde::Deserialize;

use super::MediaError;

/// Dimensions and duration of a video, as needed for delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaMetadata {
    /// Width of the first video stream in pixels.
    pub width_px: u32,
    /// Height of the first video stream in pixels.
    pub height_px: u32,
    /// Container duration in seconds (0.0 when unknown).
    pub duration_seconds: f64,
}

impl MediaMetadata {
    /// Duration rounded down to whole seconds, as attachments expect.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn whole_seconds(&self) -> u32 {
        if self.duration_seconds.is_finite() && self.duration_seconds > 0.0 {
            self.duration_seconds.floor().min(f64::from(u32::MAX)) as u32
        } else {
            0
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Arguments for probing `video`: first video stream dimensions plus the
/// container format, as JSON.
#[must_use]
pub fn probe_args(video: &Path) -> Vec<&std::ffi::OsStr> {
    [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "json",
        "-show_format",
    ]
    .into_iter()
    .map(std::ffi::OsStr::new)
    .chain(std::iter::once(video.as_os_str()))
    .collect()
}

/// Parses the JSON ffprobe prints for [`probe_args`].
///
/// An unparseable duration is treated as 0.0; a missing video stream is an error.
///
/// # Errors
///
/// - [`MediaError::InvalidProbe`] if the output is not the expected JSON
/// - [`MediaError::NoVideoStream`] if no stream is listed
pub fn parse_probe_output(video: &Path, stdout: &[u8]) -> Result<MediaMetadata, MediaError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::invalid_probe(video, e.to_string()))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::NoVideoStream {
            path: video.to_path_buf(),
        })?;

    let duration_seconds = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(MediaMetadata {
        width_px: stream.width.unwrap_or(0),
        height_px: stream.height.unwrap_or(0),
        duration_seconds,
    })
}
