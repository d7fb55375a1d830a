//! Error types for probing, transcoding and thumbnailing.

use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;

/// Errors from media tool invocations.
#[derive(Debug, Error)]
pub enum MediaError {
    /// An external media program failed, timed out or could not start.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// File system error on an input or output file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// ffprobe printed something we could not parse.
    #[error("could not read probe output for {path}: {reason}")]
    InvalidProbe {
        /// The probed file.
        path: PathBuf,
        /// What was wrong with the output.
        reason: String,
    },

    /// The probed file has no video stream.
    #[error("no video stream in {path}\n  Suggestion: the download may be an image slideshow or audio only")]
    NoVideoStream {
        /// The probed file.
        path: PathBuf,
    },
}

impl MediaError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a probe parse error.
    pub fn invalid_probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidProbe {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
