//! Error types for reference resolution.

use thiserror::Error;

/// Maximum number of characters of the input echoed back in error messages.
const PREVIEW_CHARS: usize = 64;

/// Errors that can occur while resolving free text into media references.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// Neither a link nor a numeric video id was found in the input.
    #[error("no link or video id found in '{input_preview}'\n  Suggestion: {suggestion}")]
    NothingFound {
        /// Truncated input for display
        input_preview: String,
        /// How to fix the issue
        suggestion: String,
    },
}

impl ResolutionError {
    /// Creates a `NothingFound` error for the given input text.
    #[must_use]
    pub fn nothing_found(input: &str) -> Self {
        Self::NothingFound {
            input_preview: input.trim().chars().take(PREVIEW_CHARS).collect(),
            suggestion: "Send a video link or a bare numeric video id".to_string(),
        }
    }
}
