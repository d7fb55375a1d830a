//! Media reference type produced by the resolver.

use std::fmt;

/// URL template used for references synthesized from a bare numeric video id.
pub const VIDEO_ID_URL_TEMPLATE: &str = "https://tiktok.com/@share/video/{id}";

/// A link to a short-form video, ready to be handed to the fetcher.
///
/// References are immutable once resolved. No reachability check has been
/// performed on them; that is the fetcher's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaReference {
    /// A link found verbatim in the input text.
    Link(String),
    /// A link built from a bare numeric video id.
    Synthesized {
        /// The id digits exactly as they appeared in the input.
        id: String,
        /// The canonical link built from [`VIDEO_ID_URL_TEMPLATE`].
        url: String,
    },
}

impl MediaReference {
    /// Creates a reference from a link found in text.
    #[must_use]
    pub fn link(raw: impl Into<String>) -> Self {
        Self::Link(raw.into())
    }

    /// Creates a reference from a numeric id, substituting the digits verbatim.
    ///
    /// Returns `None` unless `digits` is a non-empty run of ASCII digits that
    /// parses as a base-10 signed 64-bit integer.
    #[must_use]
    pub fn from_video_id(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<i64>().ok()?;
        Some(Self::Synthesized {
            id: digits.to_string(),
            url: VIDEO_ID_URL_TEMPLATE.replace("{id}", digits),
        })
    }

    /// Returns the link to fetch.
    #[must_use]
    pub fn as_url(&self) -> &str {
        match self {
            Self::Link(url) | Self::Synthesized { url, .. } => url,
        }
    }

    /// Returns true if this reference was synthesized from a numeric id.
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        matches!(self, Self::Synthesized { .. })
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_url())
    }
}
