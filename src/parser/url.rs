//! Link extraction from free text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

/// Regex pattern for finding links in text.
///
/// Matches a generic `host.tld/path` shape without requiring a scheme, so
/// `vm.tiktok.com/ZMabc/` is found as well as `https://www.tiktok.com/@user/video/1`.
/// A scheme, when present, is kept as part of the match.
#[allow(clippy::expect_used)]
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:[a-zA-Z][a-zA-Z0-9+.\-]*://)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .expect("link regex is valid") // Static pattern, safe to panic
});

/// Extracts every link-shaped substring from `input`, in order of appearance.
///
/// No validation of reachability or scheme is performed.
///
/// # Examples
///
/// ```
/// use ttrelay_core::parser::extract_links;
///
/// let links = extract_links("look https://vm.tiktok.com/ZMabc/ and vm.tiktok.com/ZMdef/");
/// assert_eq!(links, vec!["https://vm.tiktok.com/ZMabc/", "vm.tiktok.com/ZMdef/"]);
/// ```
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn extract_links(input: &str) -> Vec<String> {
    let links: Vec<String> = LINK_PATTERN
        .find_iter(input)
        .map(|m| clean_link_trailing(m.as_str()))
        .filter(|link| !link.is_empty())
        .inspect(|link| trace!(link = %link, "found link candidate"))
        .map(str::to_string)
        .collect();

    debug!(count = links.len(), "link extraction complete");
    links
}

/// Strips sentence punctuation that often gets captured at the end of a link.
fn clean_link_trailing(link: &str) -> &str {
    let mut result = link;

    while let Some(last) = result.chars().last() {
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' => {
                result = &result[..result.len() - 1];
            }
            ')' => {
                // Keep balanced parens (e.g. wiki-style paths)
                let open_count = result.chars().filter(|&c| c == '(').count();
                let close_count = result.chars().filter(|&c| c == ')').count();
                if close_count > open_count {
                    result = &result[..result.len() - 1];
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_links_with_scheme() {
        let links = extract_links("https://www.tiktok.com/@someone/video/7301234567890123456");
        assert_eq!(
            links,
            vec!["https://www.tiktok.com/@someone/video/7301234567890123456"]
        );
    }

    #[test]
    fn test_extract_links_without_scheme() {
        let links = extract_links("vm.tiktok.com/ZMh4bXyz/");
        assert_eq!(links, vec!["vm.tiktok.com/ZMh4bXyz/"]);
    }

    #[test]
    fn test_extract_links_preserves_order() {
        let links = extract_links("first a.com/1 then b.org/2 and finally c.net/3");
        assert_eq!(links, vec!["a.com/1", "b.org/2", "c.net/3"]);
    }

    #[test]
    fn test_extract_links_strips_sentence_punctuation() {
        let links = extract_links("watch this: https://vm.tiktok.com/ZMabc/.");
        assert_eq!(links, vec!["https://vm.tiktok.com/ZMabc/"]);
    }

    #[test]
    fn test_extract_links_keeps_balanced_parens() {
        let links = extract_links("en.wikipedia.org/wiki/Rust_(language)");
        assert_eq!(links, vec!["en.wikipedia.org/wiki/Rust_(language)"]);
    }

    #[test]
    fn test_extract_links_strips_unbalanced_paren() {
        let links = extract_links("(see vm.tiktok.com/ZMabc)");
        assert_eq!(links, vec!["vm.tiktok.com/ZMabc"]);
    }

    #[test]
    fn test_extract_links_ignores_plain_numbers() {
        assert!(extract_links("9182736450918273645").is_empty());
        assert!(extract_links("see this 9182736450918273645").is_empty());
    }

    #[test]
    fn test_extract_links_empty_input() {
        assert!(extract_links("").is_empty());
        assert!(extract_links("   \n\t").is_empty());
    }
}
