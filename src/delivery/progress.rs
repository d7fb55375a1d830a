//! Progress indicator texts.
//!
//! The indicator is one message per link, edited in place as the link moves
//! through the pipeline.

/// Initial text, sent when a link starts processing.
pub const STARTED: &str = "ok, wait a sec";

/// Initial text for a user-supplied file.
pub const STARTED_LOCAL: &str = "ok, wait a sec, downloading...";

/// The video was fetched and is about to be transcoded.
pub const DOWNLOADED: &str = "downloaded, converting...";

/// Transcoding finished (or was not needed) and the upload is starting.
pub const CONVERTED: &str = "converted, uploading...";

/// Transcoding failed; the fetched file is uploaded as is.
pub const CONVERT_FAILED: &str = "converting failed, the video will be uploaded as it is";

/// Text shown after failed upload attempt `attempt`, before the next one.
#[must_use]
pub fn retrying(attempt: u32) -> String {
    format!("while uploading an error occurred, retry number: {attempt}")
}
