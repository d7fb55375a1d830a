//! Delivery of finished videos to a chat.
//!
//! # Architecture
//!
//! - [`DeliveryTransport`] - Async trait over the chat operations the relay uses
//! - [`TelegramTransport`] - Bot API implementation of the transport
//! - [`DeliveryUploader`] - Probe, thumbnail, bounded-retry send
//! - [`DeliveryRetryPolicy`] - Attempt cap and transient-error classification
//!
//! Transport implementations must keep the underlying error chain in their
//! messages; retry classification looks for the connection reset text there.

mod error;
mod filename;
pub mod progress;
mod retry;
mod telegram;
mod uploader;

pub use error::{DeliveryError, TransportError};
pub use filename::{attachment_name, local_attachment_name};
pub use retry::{
    AttemptOutcome, DEFAULT_MAX_ATTEMPTS, DeliveryAttempt, DeliveryRetryPolicy, FailureType,
    RetryDecision, TRANSIENT_SIGNATURE, classify_message,
};
pub use telegram::{DEFAULT_TELEGRAM_URL, TelegramTransport};
pub use uploader::{DeliveryReport, DeliveryUploader};

use std::path::PathBuf;

use async_trait::async_trait;

/// Where a video is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// Target chat.
    pub chat_id: i64,
    /// Message the delivery replies to, if any.
    pub reply_to: Option<i64>,
}

impl Destination {
    /// A destination without a reply target.
    #[must_use]
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            reply_to: None,
        }
    }

    /// Sets the message to reply to.
    #[must_use]
    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// A sent progress indicator message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressHandle {
    /// Chat the indicator lives in.
    pub chat_id: i64,
    /// Message id of the indicator.
    pub message_id: i64,
}

/// A video upload with everything clients need to show it inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAttachment {
    /// File to upload.
    pub path: PathBuf,
    /// Name the recipient sees.
    pub file_name: String,
    /// Width in pixels.
    pub width_px: u32,
    /// Height in pixels.
    pub height_px: u32,
    /// Duration in whole seconds.
    pub duration_seconds: u32,
    /// Thumbnail image to attach.
    pub thumbnail: Option<PathBuf>,
    /// Caption; empty for relayed videos.
    pub caption: String,
}

/// MIME type of every uploaded video.
pub const VIDEO_MIME: &str = "video/mp4";

/// Chat operations needed by the relay.
///
/// Progress and notice calls are best effort from the pipeline's point of
/// view; only [`send_video`](Self::send_video) errors decide the outcome.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Sends a new progress indicator message.
    async fn send_progress(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<ProgressHandle, TransportError>;

    /// Replaces the text of a progress indicator.
    async fn edit_progress(&self, handle: &ProgressHandle, text: &str)
    -> Result<(), TransportError>;

    /// Removes a progress indicator.
    async fn delete_progress(&self, handle: &ProgressHandle) -> Result<(), TransportError>;

    /// Uploads a video.
    async fn send_video(
        &self,
        destination: &Destination,
        video: &VideoAttachment,
    ) -> Result<(), TransportError>;

    /// Sends a plain text notice.
    async fn send_notice(&self, destination: &Destination, text: &str)
    -> Result<(), TransportError>;
}
