//! Highlighted excerpts for search results.
//!
//! Highlight bounds are byte offsets into [`Snippet::text`] and always fall on
//! `char` boundaries, so `&snippet.text[snippet.highlight_start..snippet.highlight_end]`
//! is the matched text.

use crate::Entry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Characters of context kept on each side of a content match.
pub const CONTEXT_CHARS: usize = 75;

const ELLIPSIS: &str = "...";

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Which field of the entry a snippet was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedField {
    Title,
    Content,
    Tags,
}

/// A highlighted excerpt of matched text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub text: String,
    pub highlight_start: usize,
    pub highlight_end: usize,
    pub matched_field: MatchedField,
}

impl Snippet {
    /// The highlighted part of [`text`](Self::text).
    pub fn highlighted(&self) -> &str {
        &self.text[self.highlight_start..self.highlight_end]
    }
}

/// Builds the snippet for `entry` against `query`.
///
/// Title beats content beats tags; only the first match is reported.
/// Returns `None` when the query is blank or no field matches.
pub fn extract_snippet(entry: &Entry, query: &str) -> Option<Snippet> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if let Some((start, end)) = find_case_insensitive(&entry.title, query) {
        return Some(Snippet {
            text: entry.title.clone(),
            highlight_start: start,
            highlight_end: end,
            matched_field: MatchedField::Title,
        });
    }

    let plain = strip_markup(&entry.content);
    if let Some((start, end)) = find_case_insensitive(&plain, query) {
        return Some(content_window(&plain, start, end));
    }

    let needle = fold_case(query);
    if entry.tags.iter().any(|tag| fold_case(tag).contains(&needle)) {
        return Some(Snippet {
            text: format!("Tags: {}", entry.tags.join(", ")),
            highlight_start: 0,
            highlight_end: 0,
            matched_field: MatchedField::Tags,
        });
    }

    None
}

/// Cuts up to [`CONTEXT_CHARS`] characters either side of `start..end` out of `text`.
fn content_window(text: &str, start: usize, end: usize) -> Snippet {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map_or(0, |(i, _)| i);
    let window_end = text[end..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map_or(text.len(), |(i, _)| end + i);

    let mut snippet = String::with_capacity(window_end - window_start + 2 * ELLIPSIS.len());
    if window_start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    let highlight_start = snippet.len() + (start - window_start);
    snippet.push_str(&text[window_start..window_end]);
    if window_end < text.len() {
        snippet.push_str(ELLIPSIS);
    }

    Snippet {
        text: snippet,
        highlight_start,
        highlight_end: highlight_start + (end - start),
        matched_field: MatchedField::Content,
    }
}

/// Lowercases `text` one character at a time with full Unicode mappings.
///
/// Search uses this on both sides of a comparison, so SQL matching and
/// [`find_case_insensitive`] agree on what counts as a match.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Finds the first case-insensitive occurrence of `needle` in `haystack`.
///
/// Returns the byte range of the match in `haystack`. Comparison folds both
/// sides with [`char::to_lowercase`], so the range is valid even where
/// lowercasing changes a character's byte length.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    'start: for (start, _) in haystack.char_indices() {
        let mut matched = 0;
        for (offset, c) in haystack[start..].char_indices() {
            for folded in c.to_lowercase() {
                if matched == needle.len() || folded != needle[matched] {
                    continue 'start;
                }
                matched += 1;
            }
            if matched == needle.len() {
                return Some((start, start + offset + c.len_utf8()));
            }
        }
        // Ran out of haystack before the needle was complete.
        return None;
    }
    None
}

/// Reduces rich-text content to plain text.
///
/// Removes tags, decodes the common entities and collapses whitespace runs.
pub fn strip_markup(html: &str) -> String {
    let without_tags = MARKUP_TAG.replace_all(html, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE_RUN.replace_all(&decoded, " ").trim().to_string()
}
