//! Error types for media fetching.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::ProviderTag;
use crate::process::ProcessError;

/// Errors a single provider can return from one fetch attempt.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level error talking to the provider.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The error message including its source chain.
        message: String,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provider reported a failure in its response body.
    #[error("{provider} rejected '{reference}': {message}")]
    Rejected {
        /// Provider name.
        provider: String,
        /// The reference that was rejected.
        reference: String,
        /// Provider supplied reason.
        message: String,
    },

    /// The provider's response could not be understood.
    #[error("unexpected response from {provider}: {reason}")]
    InvalidResponse {
        /// Provider name.
        provider: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// The external downloader program failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// File system error while writing or moving the media file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provider reported success but the file it named is not a regular file.
    #[error("provider reported {path} but no regular file exists there")]
    MissingFile {
        /// The path the provider reported.
        path: PathBuf,
    },
}

impl ProviderError {
    /// Creates a network error from a reqwest error, keeping the full source chain.
    #[must_use]
    pub fn network(url: impl Into<String>, error: &reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            message: crate::http_client::error_chain_message(error),
        }
    }

    /// Creates an HTTP status error.
    #[must_use]
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a provider rejection error.
    #[must_use]
    pub fn rejected(provider: &str, reference: &str, message: &str) -> Self {
        Self::Rejected {
            provider: provider.to_string(),
            reference: reference.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(provider: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A provider that was tried and failed, kept for diagnostics and notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name (e.g. "tikwm").
    pub provider: String,
    /// Provider priority tag.
    pub tag: ProviderTag,
    /// Rendered error message.
    pub message: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.provider, self.tag, self.message)
    }
}

/// Errors from the fetcher as a whole.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No provider is registered.
    #[error("no media provider registered to fetch '{reference}'")]
    NoProviders {
        /// The reference that could not be fetched.
        reference: String,
    },

    /// Every provider failed, the primary route included.
    ///
    /// `cause` is the error of the last provider tried (the fallback in the
    /// default chain); `failures` lists every attempt in order.
    #[error("primary route exhausted for '{reference}' after {} provider(s); last error: {cause}", .failures.len())]
    PrimaryExhausted {
        /// The reference that could not be fetched.
        reference: String,
        /// Every failed attempt, in the order tried.
        failures: Vec<ProviderFailure>,
        /// The operative cause: the last provider's error.
        #[source]
        cause: ProviderError,
    },
}

impl FetchError {
    /// Returns every failed provider attempt.
    #[must_use]
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            Self::NoProviders { .. } => &[],
            Self::PrimaryExhausted { failures, .. } => failures,
        }
    }
}
