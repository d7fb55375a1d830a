//! Delivery uploader: probe, thumbnail, then send with bounded retry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::progress;
use super::retry::{AttemptOutcome, DeliveryAttempt, DeliveryRetryPolicy, FailureType, RetryDecision};
use super::{DeliveryError, DeliveryTransport, Destination, ProgressHandle, VideoAttachment};
use crate::cleanup::CleanupScheduler;
use crate::media::{MediaTools, Thumbnail, ThumbnailGenerator};

/// Successful delivery summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Every attempt in order; the last one is `Delivered`.
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    /// Number of send attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }
}

/// Sends a finished video to its destination.
#[derive(Clone)]
pub struct DeliveryUploader {
    transport: Arc<dyn DeliveryTransport>,
    tools: Arc<dyn MediaTools>,
    thumbnails: ThumbnailGenerator,
    policy: DeliveryRetryPolicy,
    cleanup: CleanupScheduler,
}

impl DeliveryUploader {
    /// Creates an uploader with the default retry policy.
    #[must_use]
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        tools: Arc<dyn MediaTools>,
        cleanup: CleanupScheduler,
    ) -> Self {
        Self {
            thumbnails: ThumbnailGenerator::new(Arc::clone(&tools)),
            transport,
            tools,
            policy: DeliveryRetryPolicy::default(),
            cleanup,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DeliveryRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn policy(&self) -> DeliveryRetryPolicy {
        self.policy
    }

    /// Delivers `video` as `file_name`.
    ///
    /// 1. Probes the video and generates its thumbnail (either failing means
    ///    nothing is sent)
    /// 2. Sends, retrying immediately on connection resets up to the policy
    ///    cap and updating `progress` before each retry
    /// 3. Schedules thumbnail deletion, whatever the send result
    /// 4. On success, deletes `progress`
    ///
    /// On failure `progress` is left showing its last text.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::Probe`] / [`DeliveryError::Thumbnail`] before any attempt
    /// - [`DeliveryError::Fatal`] on the first non-transient send error
    /// - [`DeliveryError::AttemptsExhausted`] when every attempt was reset
    #[instrument(skip(self, destination, progress), fields(video = %video.display(), file_name = %file_name))]
    pub async fn deliver(
        &self,
        destination: &Destination,
        video: &Path,
        file_name: &str,
        progress: Option<&ProgressHandle>,
    ) -> Result<DeliveryReport, DeliveryError> {
        let metadata = self
            .tools
            .probe(video)
            .await
            .map_err(DeliveryError::Probe)?;

        let thumbnail = match self
            .thumbnails
            .generate(video, metadata.duration_seconds)
            .await
        {
            Ok(thumbnail) => thumbnail,
            Err(err) => {
                self.discard_thumbnail(&Thumbnail::for_video(video)).await;
                return Err(DeliveryError::Thumbnail(err));
            }
        };

        let attachment = VideoAttachment {
            path: video.to_path_buf(),
            file_name: file_name.to_string(),
            width_px: metadata.width_px,
            height_px: metadata.height_px,
            duration_seconds: metadata.whole_seconds(),
            thumbnail: Some(thumbnail.image_path.clone()),
            caption: String::new(),
        };

        let result = self.send_with_retry(destination, &attachment, progress).await;
        self.discard_thumbnail(&thumbnail).await;

        let report = result?;
        if let Some(handle) = progress
            && let Err(e) = self.transport.delete_progress(handle).await
        {
            warn!(error = %e, "Failed to delete progress indicator");
        }
        info!(attempts = report.attempt_count(), "Video delivered");
        Ok(report)
    }

    async fn send_with_retry(
        &self,
        destination: &Destination,
        attachment: &VideoAttachment,
        progress: Option<&ProgressHandle>,
    ) -> Result<DeliveryReport, DeliveryError> {
        let mut attempts = Vec::new();
        let mut attempt: u32 = 1;

        loop {
            debug!(attempt, "Sending video");
            let err = match self.transport.send_video(destination, attachment).await {
                Ok(()) => {
                    attempts.push(DeliveryAttempt {
                        number: attempt,
                        outcome: AttemptOutcome::Delivered,
                    });
                    return Ok(DeliveryReport { attempts });
                }
                Err(err) => err,
            };

            let failure_type = err.failure_type();
            let message = err.to_string();
            attempts.push(DeliveryAttempt {
                number: attempt,
                outcome: match failure_type {
                    FailureType::Transient => AttemptOutcome::Transient(message),
                    FailureType::Fatal => AttemptOutcome::Fatal(message),
                },
            });

            match self.policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry { next_attempt } => {
                    warn!(attempt, error = %err, "Upload interrupted, retrying");
                    if let Some(handle) = progress
                        && let Err(e) = self
                            .transport
                            .edit_progress(handle, &progress::retrying(attempt))
                            .await
                    {
                        warn!(error = %e, "Failed to update progress indicator");
                    }
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(attempt, error = %err, %reason, "Upload failed");
                    return Err(match failure_type {
                        FailureType::Transient => DeliveryError::AttemptsExhausted {
                            attempts: attempt,
                            source: err,
                        },
                        FailureType::Fatal => DeliveryError::Fatal {
                            attempt,
                            source: err,
                        },
                    });
                }
            }
        }
    }

    /// Schedules immediate deletion of whichever thumbnail files exist.
    async fn discard_thumbnail(&self, thumbnail: &Thumbnail) {
        for path in thumbnail.artifacts() {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                self.cleanup.schedule(path, Duration::ZERO);
            }
        }
    }
}

impl std::fmt::Debug for DeliveryUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryUploader")
            .field("policy", &self.policy)
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}
