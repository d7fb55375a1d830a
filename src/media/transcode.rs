//! Size-based re-encode policy.
//!
//! Small files are re-encoded to H.264/AAC so every client can play them;
//! files above the threshold are passed through untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use super::{MediaError, MediaTools};

/// Default transcode threshold (20 MB, decimal).
pub const DEFAULT_TRANSCODE_THRESHOLD_BYTES: u64 = 20_000_000;

/// Suffix appended to the input path to name the re-encoded file.
pub const TRANSCODED_SUFFIX: &str = ".h264.mp4";

/// Result of applying the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    /// File to deliver. Equals the input when `reencoded` is false.
    pub path: PathBuf,
    /// Whether a new file was produced.
    pub reencoded: bool,
}

/// Returns `<path>.h264.mp4`.
#[must_use]
pub fn transcoded_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TRANSCODED_SUFFIX);
    PathBuf::from(name)
}

/// Decides whether a fetched file gets re-encoded, and does it.
#[derive(Clone)]
pub struct TranscodePolicy {
    threshold_bytes: u64,
    tools: Arc<dyn MediaTools>,
}

impl TranscodePolicy {
    /// Creates a policy with the given threshold.
    #[must_use]
    pub fn new(threshold_bytes: u64, tools: Arc<dyn MediaTools>) -> Self {
        Self {
            threshold_bytes,
            tools,
        }
    }

    /// Returns the configured threshold in bytes.
    #[must_use]
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Applies the policy to `path`.
    ///
    /// Files strictly larger than the threshold are returned as they are.
    /// Everything else is encoded to [`transcoded_path`].
    ///
    /// # Errors
    ///
    /// - [`MediaError::Io`] if the file cannot be stat'ed
    /// - [`MediaError::Process`] if the encoder fails (a partial output may
    ///   be left at [`transcoded_path`])
    #[instrument(skip(self), fields(path = %path.display(), threshold = self.threshold_bytes))]
    pub async fn apply(&self, path: &Path) -> Result<TranscodeOutcome, MediaError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| MediaError::io(path, e))?
            .len();

        if size > self.threshold_bytes {
            info!(size, "Above transcode threshold, passing through");
            return Ok(TranscodeOutcome {
                path: path.to_path_buf(),
                reencoded: false,
            });
        }

        let output = transcoded_path(path);
        self.tools.encode_compatible(path, &output).await?;
        info!(size, output = %output.display(), "Re-encoded to H.264");
        Ok(TranscodeOutcome {
            path: output,
            reencoded: true,
        })
    }
}

impl std::fmt::Debug for TranscodePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodePolicy")
            .field("threshold_bytes", &self.threshold_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::media::MediaMetadata;

    #[derive(Default)]
    struct RecordingTools {
        encoded: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    #[async_trait]
    impl MediaTools for RecordingTools {
        async fn probe(&self, _video: &Path) -> Result<MediaMetadata, MediaError> {
            unreachable!("policy never probes")
        }

        async fn encode_compatible(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
            std::fs::write(output, b"h264").unwrap();
            self.encoded
                .lock()
                .unwrap()
                .push((input.to_path_buf(), output.to_path_buf()));
            Ok(())
        }

        async fn extract_frame(
            &self,
            _video: &Path,
            _at: Duration,
            _output: &Path,
        ) -> Result<(), MediaError> {
            unreachable!("policy never extracts frames")
        }

        async fn resize_image(
            &self,
            _input: &Path,
            _bounding_box: &str,
            _output: &Path,
        ) -> Result<(), MediaError> {
            unreachable!("policy never resizes")
        }
    }

    fn sized_file(dir: &Path, name: &str, len: u64) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(len).unwrap();
        path
    }

    #[test]
    fn test_transcoded_path_appends_suffix() {
        assert_eq!(
            transcoded_path(Path::new("/s/clip.mp4")),
            PathBuf::from("/s/clip.mp4.h264.mp4")
        );
    }

    #[tokio::test]
    async fn test_large_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = sized_file(dir.path(), "big.mp4", 25_000_000);
        let tools = Arc::new(RecordingTools::default());
        let policy = TranscodePolicy::new(DEFAULT_TRANSCODE_THRESHOLD_BYTES, tools.clone());

        let outcome = policy.apply(&input).await.unwrap();
        assert!(!outcome.reencoded);
        assert_eq!(outcome.path, input);
        assert!(tools.encoded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_small_file_is_reencoded() {
        let dir = tempfile::tempdir().unwrap();
        let input = sized_file(dir.path(), "small.mp4", 5_000_000);
        let tools = Arc::new(RecordingTools::default());
        let policy = TranscodePolicy::new(DEFAULT_TRANSCODE_THRESHOLD_BYTES, tools.clone());

        let outcome = policy.apply(&input).await.unwrap();
        assert!(outcome.reencoded);
        assert_eq!(outcome.path, dir.path().join("small.mp4.h264.mp4"));
        assert_eq!(tools.encoded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exactly_threshold_is_reencoded() {
        let dir = tempfile::tempdir().unwrap();
        let input = sized_file(dir.path(), "edge.mp4", 1000);
        let policy = TranscodePolicy::new(1000, Arc::new(RecordingTools::default()));
        assert!(policy.apply(&input).await.unwrap().reencoded);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let policy = TranscodePolicy::new(1000, Arc::new(RecordingTools::default()));
        let err = policy.apply(&dir.path().join("gone.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::Io { .. }));
    }
}
