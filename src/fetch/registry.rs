//! Provider chain with priority-ordered fallback loop.
//!
//! The [`MediaFetcher`] manages a collection of providers and tries them in
//! order until one produces a file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{FetchError, FetchedMedia, MediaProvider, ProviderError, ProviderFailure};
use crate::parser::MediaReference;

/// Successful fetch result.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The fetched media.
    pub media: FetchedMedia,
    /// Providers that failed before the winning one, in order tried.
    ///
    /// Non-empty means the preferred route failed and the caller should
    /// report a provider downgrade.
    pub skipped: Vec<ProviderFailure>,
}

impl Fetched {
    /// Returns true if a higher-priority provider failed before this one succeeded.
    #[must_use]
    pub fn is_downgraded(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// A priority-ordered chain of media providers.
///
/// Providers are tried in tag order (Primary first, then Fallback). Within
/// the same tag, providers are tried in registration order.
pub struct MediaFetcher {
    providers: Vec<Box<dyn MediaProvider>>,
}

impl MediaFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registers a provider, keeping the chain sorted by tag.
    #[tracing::instrument(skip(self, provider), fields(provider_name))]
    pub fn register(&mut self, provider: Box<dyn MediaProvider>) {
        tracing::Span::current().record("provider_name", provider.name());
        debug!(
            name = provider.name(),
            tag = ?provider.tag(),
            "Registering provider"
        );
        self.providers.push(provider);
        // Stable sort keeps registration order within a tag
        self.providers.sort_by_key(|p| p.tag());
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Returns provider names in the order they will be tried.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetches the referenced video into `destination`.
    ///
    /// 1. Tries each provider in order
    /// 2. On success, makes sure the file is a regular file under `destination`
    ///    (relocating it if the provider wrote elsewhere) and returns it
    /// 3. On failure, records the failure and tries the next provider,
    ///    whatever the nature of the failure
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NoProviders` if the chain is empty.
    /// Returns `FetchError::PrimaryExhausted` if every provider fails; its
    /// source is the last provider's error.
    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    pub async fn fetch(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<Fetched, FetchError> {
        let mut failures: Vec<ProviderFailure> = Vec::new();
        let mut last_error: Option<ProviderError> = None;

        for provider in &self.providers {
            debug!(provider = provider.name(), "Trying provider");

            let attempt = match provider.fetch(reference, destination).await {
                Ok(media) => settle_into_destination(media, destination).await,
                Err(err) => Err(err),
            };

            match attempt {
                Ok(media) => {
                    info!(
                        provider = provider.name(),
                        path = %media.local_path.display(),
                        skipped = failures.len(),
                        "Fetch successful"
                    );
                    return Ok(Fetched {
                        media,
                        skipped: failures,
                    });
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        error = %err,
                        "Provider failed, trying next"
                    );
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        tag: provider.tag(),
                        message: err.to_string(),
                    });
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(cause) => Err(FetchError::PrimaryExhausted {
                reference: reference.to_string(),
                failures,
                cause,
            }),
            None => Err(FetchError::NoProviders {
                reference: reference.to_string(),
            }),
        }
    }
}

/// Verifies the fetched file and moves it under `destination` if needed.
async fn settle_into_destination(
    media: FetchedMedia,
    destination: &Path,
) -> Result<FetchedMedia, ProviderError> {
    let metadata = tokio::fs::metadata(&media.local_path)
        .await
        .map_err(|_| ProviderError::MissingFile {
            path: media.local_path.clone(),
        })?;
    if !metadata.is_file() {
        return Err(ProviderError::MissingFile {
            path: media.local_path,
        });
    }

    if media.local_path.parent() == Some(destination) {
        return Ok(media);
    }

    let relocated = relocate(&media.local_path, destination).await?;
    debug!(
        from = %media.local_path.display(),
        to = %relocated.display(),
        "Relocated fetched file into destination"
    );
    Ok(FetchedMedia {
        local_path: relocated,
        ..media
    })
}

/// Moves `path` into `destination`, falling back to copy + remove across devices.
async fn relocate(path: &Path, destination: &Path) -> Result<PathBuf, ProviderError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ProviderError::MissingFile {
            path: path.to_path_buf(),
        })?;
    let target = destination.join(file_name);

    if tokio::fs::rename(path, &target).await.is_ok() {
        return Ok(target);
    }

    tokio::fs::copy(path, &target)
        .await
        .map_err(|e| ProviderError::io(&target, e))?;
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove source after copy");
    }
    Ok(target)
}

impl std::fmt::Debug for MediaFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFetcher")
            .field("provider_count", &self.providers.len())
            .field("providers", &self.provider_names())
            .finish()
    }
}

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}
