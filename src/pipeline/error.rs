//! Errors that end a relay invocation.

use std::path::PathBuf;

use thiserror::Error;

use crate::delivery::{DeliveryError, TransportError};
use crate::fetch::FetchError;
use crate::media::MediaError;
use crate::parser::ResolutionError;

/// Errors from relaying a message or a file.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input contained nothing to relay.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Every provider failed for a link.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Re-encoding a user-supplied file failed.
    #[error("cannot convert video: {0}")]
    Transcode(#[source] MediaError),

    /// The video could not be delivered.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The progress indicator could not be created.
    #[error("cannot start progress indicator: {0}")]
    Progress(#[from] TransportError),

    /// A user-supplied file could not be copied into the scratch directory.
    #[error("cannot stage {path}: {source}")]
    Stage {
        /// File that was being staged.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
