//! Per-message orchestration: resolve, fetch, transcode, deliver, clean up.
//!
//! Links found in one message are relayed one after another in discovery
//! order. The first link that fails ends the run; later links are not
//! attempted. Each link gets its own progress indicator.

mod error;
mod report;

pub use error::PipelineError;
pub use report::{LinkReport, Notice, RelaySummary};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::cleanup::CleanupScheduler;
use crate::config::RelayConfig;
use crate::delivery::{
    DeliveryTransport, DeliveryUploader, Destination, ProgressHandle, TelegramTransport,
    attachment_name, local_attachment_name, progress,
};
use crate::fetch::{MediaFetcher, TikwmProvider, YtDlpProvider, default_fetcher, scratch_nonce};
use crate::http_client::{CONNECT_TIMEOUT_SECS, build_http_client};
use crate::media::{FfmpegTools, MediaError, MediaTools, TranscodePolicy, transcoded_path};
use crate::parser::{MediaReference, resolve_required};
use crate::process::ProcessRunner;

/// The assembled relay.
#[derive(Clone)]
pub struct RelayPipeline {
    fetcher: Arc<MediaFetcher>,
    transcoder: TranscodePolicy,
    uploader: DeliveryUploader,
    transport: Arc<dyn DeliveryTransport>,
    cleanup: CleanupScheduler,
    scratch_dir: PathBuf,
}

/// Result of the transcode step: the file to send and what happened.
struct Prepared {
    path: PathBuf,
    reencoded: bool,
    failure: Option<MediaError>,
}

impl RelayPipeline {
    /// Assembles a pipeline from its parts.
    #[must_use]
    pub fn new(
        fetcher: MediaFetcher,
        tools: Arc<dyn MediaTools>,
        transport: Arc<dyn DeliveryTransport>,
        cleanup: CleanupScheduler,
        scratch_dir: impl Into<PathBuf>,
        transcode_threshold_bytes: u64,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            transcoder: TranscodePolicy::new(transcode_threshold_bytes, Arc::clone(&tools)),
            uploader: DeliveryUploader::new(Arc::clone(&transport), tools, cleanup.clone()),
            transport,
            cleanup,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Builds the production pipeline (tikwm, yt-dlp, ffmpeg tools, Telegram).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::HttpClient`] if the HTTP client cannot be built.
    pub fn from_config(config: &RelayConfig, debug_mode: bool) -> Result<Self, PipelineError> {
        let client = build_http_client(CONNECT_TIMEOUT_SECS, config.http_timeout_secs)?;
        let runner = ProcessRunner::from_timeout(config.process_timeout());

        let fetcher = default_fetcher(
            TikwmProvider::with_base_url(client.clone(), &config.tikwm_url),
            YtDlpProvider::new(&config.tools.yt_dlp, runner.clone()),
        );
        let tools: Arc<dyn MediaTools> = Arc::new(FfmpegTools::new(config.tools.clone(), runner));
        let transport: Arc<dyn DeliveryTransport> = Arc::new(TelegramTransport::new(
            client,
            &config.tg_url,
            &config.token,
        ));
        let cleanup = CleanupScheduler::for_mode(debug_mode, config.cleanup_grace());

        Ok(Self::new(
            fetcher,
            tools,
            transport,
            cleanup,
            &config.data_dir_path,
            config.transcode_threshold_bytes,
        ))
    }

    /// The cleanup scheduler shared by every stage.
    #[must_use]
    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    /// The scratch directory.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Relays every video referenced in `text` to `destination`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Resolution`] if `text` references nothing
    /// - the error of the first link that fails (see [`relay_link`](Self::relay_link))
    #[instrument(skip(self, text), fields(chat_id = destination.chat_id))]
    pub async fn relay_text(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<RelaySummary, PipelineError> {
        let references = resolve_required(text)?;
        info!(links = references.len(), "Relaying message");

        let mut summary = RelaySummary::default();
        for reference in &references {
            let report = self.relay_link(destination, reference).await?;
            summary.links.push(report);
        }
        Ok(summary)
    }

    /// Relays one reference.
    ///
    /// Every scratch file is scheduled for deletion as soon as it exists.
    /// On error the progress indicator keeps its last text.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Progress`] if the indicator cannot be sent
    /// - [`PipelineError::Fetch`] if every provider fails
    /// - [`PipelineError::Delivery`] if probing, thumbnailing or sending fails
    #[instrument(skip(self, destination), fields(reference = %reference))]
    pub async fn relay_link(
        &self,
        destination: &Destination,
        reference: &MediaReference,
    ) -> Result<LinkReport, PipelineError> {
        let handle = self
            .transport
            .send_progress(destination, progress::STARTED)
            .await?;

        let fetched = self.fetcher.fetch(reference, &self.scratch_dir).await?;
        self.cleanup.schedule_default(&fetched.media.local_path);
        self.update_progress(&handle, progress::DOWNLOADED).await;

        let prepared = self.prepare(&fetched.media.local_path).await;
        let mut notices = Vec::new();
        if let Some(err) = &prepared.failure {
            warn!(error = %err, "Transcode failed, delivering original file");
            notices.push(Notice::TranscodeFailed {
                reason: err.to_string(),
            });
            self.update_progress(&handle, progress::CONVERT_FAILED).await;
        } else {
            self.update_progress(&handle, progress::CONVERTED).await;
        }

        let name = attachment_name(
            &fetched.media.author_handle,
            fetched.media.created_at_unix_seconds,
        );
        let delivery = self
            .uploader
            .deliver(destination, &prepared.path, &name, Some(&handle))
            .await?;

        if let Some(first) = fetched.skipped.first() {
            let notice = Notice::ProviderDowngrade {
                provider: first.provider.clone(),
            };
            if let Err(e) = self
                .transport
                .send_notice(destination, &notice.to_string())
                .await
            {
                warn!(error = %e, "Failed to send downgrade notice");
            }
            notices.push(notice);
        }

        Ok(LinkReport {
            reference: Some(reference.clone()),
            provenance: Some(fetched.media.provenance),
            delivered_path: prepared.path,
            attachment_name: name,
            reencoded: prepared.reencoded,
            attempts: delivery.attempt_count(),
            notices,
        })
    }

    /// Relays a video file supplied by the user, keeping its file name.
    ///
    /// The file is copied into the scratch directory first, so the caller's
    /// copy is never deleted. Unlike fetched links, a failed conversion ends
    /// the run.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Stage`] if the file cannot be copied
    /// - [`PipelineError::Transcode`] if re-encoding fails
    /// - [`PipelineError::Progress`] / [`PipelineError::Delivery`] as for links
    #[instrument(skip(self, destination), fields(file = %file.display()))]
    pub async fn relay_local_file(
        &self,
        destination: &Destination,
        file: &Path,
    ) -> Result<LinkReport, PipelineError> {
        let handle = self
            .transport
            .send_progress(destination, progress::STARTED_LOCAL)
            .await?;

        let name = local_attachment_name(file);
        let staged = self.scratch_dir.join(format!("local_{}_{name}", scratch_nonce()));
        tokio::fs::copy(file, &staged)
            .await
            .map_err(|source| PipelineError::Stage {
                path: file.to_path_buf(),
                source,
            })?;
        self.cleanup.schedule_default(&staged);
        self.update_progress(&handle, progress::DOWNLOADED).await;

        let prepared = self.prepare(&staged).await;
        if let Some(err) = prepared.failure {
            return Err(PipelineError::Transcode(err));
        }
        self.update_progress(&handle, progress::CONVERTED).await;

        let delivery = self
            .uploader
            .deliver(destination, &prepared.path, &name, Some(&handle))
            .await?;

        Ok(LinkReport {
            reference: None,
            provenance: None,
            delivered_path: prepared.path,
            attachment_name: name,
            reencoded: prepared.reencoded,
            attempts: delivery.attempt_count(),
            notices: Vec::new(),
        })
    }

    /// Applies the transcode policy, registering any file it leaves behind.
    async fn prepare(&self, input: &Path) -> Prepared {
        match self.transcoder.apply(input).await {
            Ok(outcome) => {
                if outcome.reencoded {
                    self.cleanup.schedule_default(&outcome.path);
                }
                Prepared {
                    path: outcome.path,
                    reencoded: outcome.reencoded,
                    failure: None,
                }
            }
            Err(err) => {
                let partial = transcoded_path(input);
                if tokio::fs::try_exists(&partial).await.unwrap_or(false) {
                    self.cleanup.schedule_default(&partial);
                }
                Prepared {
                    path: input.to_path_buf(),
                    reencoded: false,
                    failure: Some(err),
                }
            }
        }
    }

    async fn update_progress(&self, handle: &ProgressHandle, text: &str) {
        if let Err(e) = self.transport.edit_progress(handle, text).await {
            warn!(error = %e, text, "Failed to update progress indicator");
        }
    }
}

impl std::fmt::Debug for RelayPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayPipeline")
            .field("fetcher", &self.fetcher)
            .field("transcoder", &self.transcoder)
            .field("cleanup", &self.cleanup)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_builds_default_chain() {
        let config = RelayConfig {
            token: "123:abc".to_string(),
            ..RelayConfig::default()
        };
        let pipeline = RelayPipeline::from_config(&config, true).unwrap();
        assert_eq!(pipeline.fetcher.provider_names(), vec!["tikwm", "yt-dlp"]);
        assert!(!pipeline.cleanup().is_enabled());
        assert_eq!(pipeline.scratch_dir(), Path::new("./data"));
    }
}
