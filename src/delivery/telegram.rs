//! Telegram Bot API transport.
//!
//! Implements [`DeliveryTransport`] with `sendMessage`, `editMessageText`,
//! `deleteMessage` and a multipart `sendVideo`. Request URLs embed the bot
//! token, so URLs are stripped from every reqwest error before it is kept.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Body, Client};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{
    DeliveryTransport, Destination, ProgressHandle, TransportError, VIDEO_MIME, VideoAttachment,
};

/// Default Bot API base URL.
pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Delivers through the Telegram Bot API.
pub struct TelegramTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramTransport {
    /// Creates a transport against `base_url` (e.g. a local Bot API server).
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: token.into(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::network(method, &e.without_url()))?;
        Self::parse_response(method, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::network(method, &e.without_url()))?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(TransportError::InvalidResponse {
                    method: method.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(TransportError::api(
                    method,
                    Some(i64::from(status.as_u16())),
                    text.trim(),
                ));
            }
        };

        if !envelope.ok {
            return Err(TransportError::api(
                method,
                envelope.error_code,
                envelope
                    .description
                    .unwrap_or_else(|| "request failed".to_string()),
            ));
        }

        envelope.result.ok_or_else(|| TransportError::InvalidResponse {
            method: method.to_string(),
            reason: "ok response without result".to_string(),
        })
    }

    /// Streams the file at `path` as a multipart part of known length.
    async fn file_part(path: &Path, file_name: String, mime: &str) -> Result<Part, TransportError> {
        let io_error = |source| TransportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let length = file.metadata().await.map_err(io_error)?.len();
        Part::stream_with_length(Body::from(file), length)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| TransportError::InvalidResponse {
                method: "sendVideo".to_string(),
                reason: format!("invalid MIME type {mime}: {e}"),
            })
    }

    fn message_body(destination: &Destination, text: &str) -> Value {
        let mut body = json!({
            "chat_id": destination.chat_id,
            "text": text,
        });
        if let Some(reply_to) = destination.reply_to {
            body["reply_to_message_id"] = json!(reply_to);
        }
        body
    }

    async fn video_form(
        destination: &Destination,
        video: &VideoAttachment,
    ) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .text("chat_id", destination.chat_id.to_string())
            .text("width", video.width_px.to_string())
            .text("height", video.height_px.to_string())
            .text("duration", video.duration_seconds.to_string())
            .text("supports_streaming", "true")
            .text("caption", video.caption.clone());
        if let Some(reply_to) = destination.reply_to {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }

        let video_part = Self::file_part(&video.path, video.file_name.clone(), VIDEO_MIME).await?;
        form = form.part("video", video_part);

        if let Some(thumbnail) = &video.thumbnail {
            let name = thumbnail
                .file_name()
                .map_or_else(|| "thumb.jpg".to_string(), |n| n.to_string_lossy().into_owned());
            form = form.part("thumbnail", Self::file_part(thumbnail, name, "image/jpeg").await?);
        }
        Ok(form)
    }
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeliveryTransport for TelegramTransport {
    #[instrument(level = "debug", skip(self, text), fields(chat_id = destination.chat_id))]
    async fn send_progress(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<ProgressHandle, TransportError> {
        let sent: SentMessage = self
            .call_json("sendMessage", &Self::message_body(destination, text))
            .await?;
        Ok(ProgressHandle {
            chat_id: destination.chat_id,
            message_id: sent.message_id,
        })
    }

    #[instrument(level = "debug", skip(self, text), fields(message_id = handle.message_id))]
    async fn edit_progress(
        &self,
        handle: &ProgressHandle,
        text: &str,
    ) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": handle.chat_id,
            "message_id": handle.message_id,
            "text": text,
        });
        let _: Value = self.call_json("editMessageText", &body).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(message_id = handle.message_id))]
    async fn delete_progress(&self, handle: &ProgressHandle) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": handle.chat_id,
            "message_id": handle.message_id,
        });
        let _: bool = self.call_json("deleteMessage", &body).await?;
        Ok(())
    }

    #[instrument(skip(self, video), fields(chat_id = destination.chat_id, file_name = %video.file_name))]
    async fn send_video(
        &self,
        destination: &Destination,
        video: &VideoAttachment,
    ) -> Result<(), TransportError> {
        const METHOD: &str = "sendVideo";
        let form = Self::video_form(destination, video).await?;

        debug!(path = %video.path.display(), "Uploading video");
        let response = self
            .client
            .post(self.api_url(METHOD))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::network(METHOD, &e.without_url()))?;
        let _: Value = Self::parse_response(METHOD, response).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(chat_id = destination.chat_id))]
    async fn send_notice(
        &self,
        destination: &Destination,
        text: &str,
    ) -> Result<(), TransportError> {
        let _: Value = self
            .call_json("sendMessage", &Self::message_body(destination, text))
            .await?;
        Ok(())
    }
}
