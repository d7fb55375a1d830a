//! Attachment naming.

use std::path::Path;

use chrono::DateTime;

/// Builds the attachment name `@{author}_{YYYY-MM-DD}.mp4`.
///
/// The date is the UTC calendar date of `created_at_unix_seconds`; an
/// out-of-range timestamp renders as the Unix epoch.
#[must_use]
pub fn attachment_name(author_handle: &str, created_at_unix_seconds: i64) -> String {
    let date = DateTime::from_timestamp(created_at_unix_seconds, 0).unwrap_or_default();
    let author = author_handle.trim_start_matches('@');
    format!("@{author}_{}.mp4", date.format("%Y-%m-%d"))
}

/// Attachment name for a file supplied by the user: its own file name.
#[must_use]
pub fn local_attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "video.mp4".to_string())
}
