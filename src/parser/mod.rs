//! Reference resolution: turning free text into media references.
//!
//! This module scans inbound text for link-shaped substrings. When no link is
//! present, it falls back to a numeric video id and synthesizes the canonical
//! link for it.
//!
//! # Example
//!
//! ```
//! use ttrelay_core::parser::resolve_references;
//!
//! let refs = resolve_references("7301234567890123456");
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].as_url(), "https://tiktok.com/@share/video/7301234567890123456");
//! ```

mod error;
mod reference;
mod url;

pub use error::ResolutionError;
pub use reference::{MediaReference, VIDEO_ID_URL_TEMPLATE};
pub use url::extract_links;

use tracing::{debug, info};

/// Resolves raw text into an ordered list of media references.
///
/// # Behavior
///
/// 1. Every link-shaped substring becomes a [`MediaReference::Link`], in order.
/// 2. If there are none, the whole (trimmed) text is tried as a base-10
///    signed 64-bit integer and synthesized into a link.
/// 3. Failing that, the first standalone run of digits that parses as a
///    signed 64-bit integer is used, so `"see this 7301234567890123456"` still works.
/// 4. Otherwise the result is empty (not an error; see [`resolve_required`]).
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn resolve_references(input: &str) -> Vec<MediaReference> {
    let links = extract_links(input);
    if !links.is_empty() {
        info!(links = links.len(), "Resolved links from text");
        return links.into_iter().map(MediaReference::link).collect();
    }

    if let Some(reference) = MediaReference::from_video_id(input.trim()) {
        info!(url = %reference, "Synthesized link from bare video id");
        return vec![reference];
    }

    let embedded = input
        .split(|c: char| !c.is_ascii_digit())
        .find_map(MediaReference::from_video_id);
    if let Some(reference) = embedded {
        info!(url = %reference, "Synthesized link from video id in text");
        return vec![reference];
    }

    debug!("No link or video id found");
    Vec::new()
}

/// Like [`resolve_references`], but an empty result is an error.
///
/// # Errors
///
/// Returns [`ResolutionError::NothingFound`] when the text contains neither a
/// link nor a parseable numeric id.
pub fn resolve_required(input: &str) -> Result<Vec<MediaReference>, ResolutionError> {
    let references = resolve_references(input);
    if references.is_empty() {
        return Err(ResolutionError::nothing_found(input));
    }
    Ok(references)
}
