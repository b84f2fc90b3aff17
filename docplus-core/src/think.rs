//! Think-tag parser.
//!
//! Separates reasoning spans (`<think>…</think>`) from visible content. The
//! same batch function serves one-shot responses and streaming: the streaming
//! bridge re-applies it to the whole accumulated buffer on every chunk, which
//! keeps the split identical to parsing the complete response once.
//!
//! Reasoning text never appears in `content`; callers surface it through a
//! separate channel only.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Opening reasoning marker.
pub const THINK_OPEN: &str = "<think>";
/// Closing reasoning marker.
pub const THINK_CLOSE: &str = "</think>";

static THINK_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think-span pattern"));

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-run pattern"));

/// Result of splitting a (possibly partial) response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkParseResult {
    /// Visible text with every reasoning span removed
    pub content: String,
    /// Reasoning spans joined by a blank line
    pub thinking: String,
    /// An opening marker has no closing marker yet
    pub is_thinking: bool,
}

/// Split `text` into visible content and reasoning.
///
/// Text without an opening marker is returned untouched. Otherwise complete
/// spans are removed in document order, a dangling opening marker turns the
/// rest of the text into an in-progress span, and the remaining content is
/// trimmed with runs of blank lines collapsed to a single blank line.
pub fn parse_think_tags(text: &str) -> ThinkParseResult {
    if !text.contains(THINK_OPEN) {
        return ThinkParseResult {
            content: text.to_string(),
            ..Default::default()
        };
    }

    let mut spans: Vec<String> = Vec::new();
    let mut remaining = THINK_SPAN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            spans.push(caps[1].trim().to_string());
            ""
        })
        .into_owned();

    let mut is_thinking = false;
    if let Some(open) = remaining.find(THINK_OPEN) {
        spans.push(remaining[open + THINK_OPEN.len()..].trim().to_string());
        remaining.truncate(open);
        is_thinking = true;
    }

    let content = BLANK_RUNS.replace_all(remaining.trim(), "\n\n").into_owned();
    let thinking = spans
        .into_iter()
        .filter(|span| !span.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    ThinkParseResult {
        content,
        thinking,
        is_thinking,
    }
}

/// Length in bytes of a trailing partial marker.
///
/// A chunk boundary can split `<think>` or `</think>`; while streaming, the
/// bridge holds that tail back so a half-received marker is never delivered
/// as content.
pub fn pending_marker_len(text: &str) -> usize {
    [THINK_OPEN, THINK_CLOSE]
        .iter()
        .flat_map(|marker| (1..marker.len()).map(move |n| &marker[..n]))
        .filter(|prefix| text.ends_with(prefix))
        .map(str::len)
        .max()
        .unwrap_or(0)
}
