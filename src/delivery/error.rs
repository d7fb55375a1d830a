//! Error types for the delivery transport and uploader.

use std::path::PathBuf;

use thiserror::Error;

use super::retry::{FailureType, classify_message};
use crate::media::MediaError;

/// Errors from a single transport call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure; `message` carries the full source chain.
    #[error("{method}: network error: {message}")]
    Network {
        /// API method that failed.
        method: String,
        /// Error message including its source chain.
        message: String,
        /// Whether an IO error in the chain reported a connection reset.
        connection_reset: bool,
    },

    /// The chat API answered with an error.
    #[error("{method}: API error{}: {description}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Api {
        /// API method that failed.
        method: String,
        /// Error code, when reported.
        code: Option<i64>,
        /// Error description as reported.
        description: String,
    },

    /// The API answer could not be understood.
    #[error("{method}: unexpected response: {reason}")]
    InvalidResponse {
        /// API method that failed.
        method: String,
        /// What was wrong with the answer.
        reason: String,
    },

    /// A file to upload could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Creates a network error from a reqwest error, keeping the full source chain.
    #[must_use]
    pub fn network(method: &str, error: &reqwest::Error) -> Self {
        Self::Network {
            method: method.to_string(),
            message: crate::http_client::error_chain_message(error),
            connection_reset: crate::http_client::is_connection_reset(error),
        }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(method: &str, code: Option<i64>, description: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            code,
            description: description.into(),
        }
    }

    /// Classifies this error for retry purposes.
    ///
    /// A reset seen on the IO error itself wins; otherwise the rendered
    /// message is matched against the reset signature.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Network {
                connection_reset: true,
                ..
            } => FailureType::Transient,
            _ => classify_message(&self.to_string()),
        }
    }
}

/// Errors from delivering one video.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The video could not be probed; nothing was sent.
    #[error("cannot probe video before upload: {0}")]
    Probe(#[source] MediaError),

    /// The thumbnail could not be produced; nothing was sent.
    #[error("cannot generate thumbnail: {0}")]
    Thumbnail(#[source] MediaError),

    /// A non-retryable error ended delivery.
    #[error("upload failed on attempt {attempt}: {source}")]
    Fatal {
        /// Attempt that failed (1-indexed).
        attempt: u32,
        /// The transport error.
        #[source]
        source: TransportError,
    },

    /// Every allowed attempt failed with a connection reset.
    #[error("upload failed after {attempts} attempts: {source}")]
    AttemptsExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last transport error.
        #[source]
        source: TransportError,
    },
}

impl DeliveryError {
    /// Number of send attempts made before the error (0 if none were made).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Probe(_) | Self::Thumbnail(_) => 0,
            Self::Fatal { attempt, .. } => *attempt,
            Self::AttemptsExhausted { attempts, .. } => *attempts,
        }
    }
}
