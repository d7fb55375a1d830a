//! What a relay run produced.

use std::fmt;
use std::path::PathBuf;

use crate::fetch::ProviderTag;
use crate::parser::MediaReference;

/// Something the recipient should know about a delivery that still succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The preferred provider failed and a fallback fetched the video.
    ProviderDowngrade {
        /// Name of the provider that failed first.
        provider: String,
    },
    /// Re-encoding failed and the fetched file was delivered as is.
    TranscodeFailed {
        /// Rendered encoder error.
        reason: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderDowngrade { provider } => write!(f, "{provider} failed"),
            Self::TranscodeFailed { .. } => f.write_str(crate::delivery::progress::CONVERT_FAILED),
        }
    }
}

/// Outcome of one delivered video.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkReport {
    /// The reference relayed; `None` for a user-supplied file.
    pub reference: Option<MediaReference>,
    /// Provider that fetched the video; `None` for a user-supplied file.
    pub provenance: Option<ProviderTag>,
    /// File that was uploaded.
    pub delivered_path: PathBuf,
    /// Name the recipient sees.
    pub attachment_name: String,
    /// Whether the uploaded file is a re-encode.
    pub reencoded: bool,
    /// Number of upload attempts.
    pub attempts: u32,
    /// Notices raised along the way.
    pub notices: Vec<Notice>,
}

/// Outcome of relaying one inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelaySummary {
    /// One report per link, in discovery order.
    pub links: Vec<LinkReport>,
}

impl RelaySummary {
    /// Number of delivered videos.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.links.len()
    }

    /// Every notice, in order.
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.links.iter().flat_map(|link| link.notices.iter())
    }
}
