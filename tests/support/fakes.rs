//! In-process stand-ins for providers, media tools and the chat transport.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ttrelay_core::delivery::VideoAttachment;
use ttrelay_core::media::MediaMetadata;
use ttrelay_core::process::ProcessError;
use ttrelay_core::{
    DeliveryTransport, Destination, FetchedMedia, MediaError, MediaProvider, MediaReference,
    MediaTools, ProgressHandle, ProviderError, ProviderTag, TransportError,
};

// ==================== Providers ====================

/// Provider that either writes a file of a fixed size or fails.
pub struct StubProvider {
    name: &'static str,
    tag: ProviderTag,
    outcome: StubOutcome,
    calls: AtomicUsize,
}

enum StubOutcome {
    Writes { file_name: String, size: u64, author: String, created_at: i64 },
    Fails(String),
}

impl StubProvider {
    pub fn writing(name: &'static str, tag: ProviderTag, file_name: &str, size: u64) -> Self {
        Self {
            name,
            tag,
            outcome: StubOutcome::Writes {
                file_name: file_name.to_string(),
                size,
                author: "someone".to_string(),
                created_at: 1_700_000_000,
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, tag: ProviderTag, message: &str) -> Self {
        Self {
            name,
            tag,
            outcome: StubOutcome::Fails(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn tag(&self) -> ProviderTag {
        self.tag
    }

    async fn fetch(
        &self,
        _reference: &MediaReference,
        destination: &Path,
    ) -> Result<FetchedMedia, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            StubOutcome::Writes {
                file_name,
                size,
                author,
                created_at,
            } => {
                let path = destination.join(file_name);
                let file = std::fs::File::create(&path).map_err(|e| ProviderError::io(&path, e))?;
                file.set_len(*size).map_err(|e| ProviderError::io(&path, e))?;
                Ok(FetchedMedia {
                    local_path: path,
                    author_handle: author.clone(),
                    created_at_unix_seconds: *created_at,
                    provenance: self.tag,
                })
            }
            StubOutcome::Fails(message) => Err(ProviderError::invalid_response(self.name, message)),
        }
    }
}

/// Lets a test keep a handle on a provider after boxing it into the fetcher.
pub struct Shared<P>(pub std::sync::Arc<P>);

#[async_trait]
impl<P: MediaProvider> MediaProvider for Shared<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn tag(&self) -> ProviderTag {
        self.0.tag()
    }

    async fn fetch(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<FetchedMedia, ProviderError> {
        self.0.fetch(reference, destination).await
    }
}

// ==================== Media tools ====================

/// Media tools that write placeholder files instead of running programs.
pub struct FakeTools {
    metadata: MediaMetadata,
    encode_fails: bool,
    encoded: Mutex<Vec<PathBuf>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            metadata: MediaMetadata {
                width_px: 720,
                height_px: 1280,
                duration_seconds: 12.4,
            },
            encode_fails: false,
            encoded: Mutex::new(Vec::new()),
        }
    }

    /// Encoding leaves a partial output behind and then fails.
    pub fn failing_encode() -> Self {
        Self {
            encode_fails: true,
            ..Self::new()
        }
    }

    pub fn encoded(&self) -> Vec<PathBuf> {
        self.encoded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTools for FakeTools {
    async fn probe(&self, _video: &Path) -> Result<MediaMetadata, MediaError> {
        Ok(self.metadata)
    }

    async fn encode_compatible(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        self.encoded.lock().unwrap().push(input.to_path_buf());
        std::fs::write(output, b"h264").map_err(|e| MediaError::io(output, e))?;
        if self.encode_fails {
            return Err(MediaError::Process(ProcessError::Failed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                output: "Invalid data found when processing input".to_string(),
            }));
        }
        Ok(())
    }

    async fn extract_frame(
        &self,
        _video: &Path,
        _at: Duration,
        output: &Path,
    ) -> Result<(), MediaError> {
        std::fs::write(output, b"png").map_err(|e| MediaError::io(output, e))
    }

    async fn resize_image(
        &self,
        _input: &Path,
        _bounding_box: &str,
        output: &Path,
    ) -> Result<(), MediaError> {
        std::fs::write(output, b"jpg").map_err(|e| MediaError::io(output, e))
    }
}

// ==================== Transport ====================

/// One call made against [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Progress(String),
    Edit(String),
    Delete,
    Video(String),
    Notice(String),
}

/// Transport that records every call and replays scripted `send_video` results.
#[derive(Default)]
pub struct RecordingTransport {
    video_results: Mutex<VecDeque<Result<(), TransportError>>>,
    events: Mutex<Vec<ChatEvent>>,
    videos: Mutex<Vec<VideoAttachment>>,
}

impl RecordingTransport {
    pub fn with_video_results(results: Vec<Result<(), TransportError>>) -> Self {
        Self {
            video_results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn videos(&self) -> Vec<VideoAttachment> {
        self.videos.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Edit(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ChatEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn send_progress(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<ProgressHandle, TransportError> {
        self.record(ChatEvent::Progress(text.to_string()));
        Ok(ProgressHandle {
            chat_id: destination.chat_id,
            message_id: 100,
        })
    }

    async fn edit_progress(&self, _handle: &ProgressHandle, text: &str) -> Result<(), TransportError> {
        self.record(ChatEvent::Edit(text.to_string()));
        Ok(())
    }

    async fn delete_progress(&self, _handle: &ProgressHandle) -> Result<(), TransportError> {
        self.record(ChatEvent::Delete);
        Ok(())
    }

    async fn send_video(
        &self,
        _destination: &Destination,
        video: &VideoAttachment,
    ) -> Result<(), TransportError> {
        self.record(ChatEvent::Video(video.file_name.clone()));
        self.videos.lock().unwrap().push(video.clone());
        self.video_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn send_notice(&self, _destination: &Destination, text: &str) -> Result<(), TransportError> {
        self.record(ChatEvent::Notice(text.to_string()));
        Ok(())
    }
}

/// The error a dropped upload connection produces.
pub fn connection_reset() -> Result<(), TransportError> {
    Err(TransportError::Network {
        method: "sendVideo".to_string(),
        message: "error sending request: connection error: Connection reset by peer (os error 104)"
            .to_string(),
        connection_reset: true,
    })
}
