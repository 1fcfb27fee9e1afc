//! Preview annotation.
//!
//! Produces the human-readable preview of a sentence with token spans and
//! grammar-error spans wrapped in HTML markers. All spans are computed
//! against the *original, unmodified* base text and rendered in a single
//! pass; the engine never rewrites a mutating string, so overlapping or
//! repeated substrings cannot be mismatched or double-annotated.
//!
//! Overlap policy: error spans take precedence over token spans; overlaps of
//! the same kind resolve by ascending offset (the earlier span wins).

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::emit::escape_literal;

/// A grammar-error span reported by an external checker.
///
/// Offsets are byte offsets into the text the error was reported against
/// (the rendered text when present, else the source text).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarError {
    /// Start of the span.
    pub offset: usize,
    /// Length of the span in bytes.
    pub length: usize,
    /// Human-readable description of the error.
    pub message: String,
}

impl GrammarError {
    /// Build a grammar-error span.
    pub fn new(offset: usize, length: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            length,
            message: message.into(),
        }
    }

    /// Whether this span indexes validly into `text`.
    pub fn fits(&self, text: &str) -> bool {
        let end = match self.offset.checked_add(self.length) {
            Some(end) => end,
            None => return false,
        };
        self.length > 0
            && end <= text.len()
            && text.is_char_boundary(self.offset)
            && text.is_char_boundary(end)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Error,
    Token,
}

struct MarkSpan<'a> {
    start: usize,
    end: usize,
    kind: SpanKind,
    message: Option<&'a str>,
}

/// Annotate `base` with token highlights and grammar-error popovers.
///
/// Every occurrence of every placeholder is highlighted; each grammar error
/// wraps the exact substring its span covers. Text outside the marked spans
/// is preserved unchanged. Spans that do not fit the base text are skipped.
pub fn annotate<S: AsRef<str>>(base: &str, placeholders: &[S], errors: &[GrammarError]) -> String {
    let mut spans: Vec<MarkSpan> = Vec::new();

    for error in errors {
        if !error.fits(base) {
            warn!(
                offset = error.offset,
                length = error.length,
                "skipping grammar-error span outside base text"
            );
            continue;
        }
        spans.push(MarkSpan {
            start: error.offset,
            end: error.offset + error.length,
            kind: SpanKind::Error,
            message: Some(&error.message),
        });
    }

    for placeholder in placeholders {
        let placeholder = placeholder.as_ref();
        if placeholder.is_empty() {
            continue;
        }
        let pattern =
            Regex::new(&escape_literal(placeholder)).expect("escaped literal is a valid pattern");
        for found in pattern.find_iter(base) {
            spans.push(MarkSpan {
                start: found.start(),
                end: found.end(),
                kind: SpanKind::Token,
                message: None,
            });
        }
    }

    // Error spans first, then ascending offset within each kind; the sweep
    // below keeps the first span claiming any overlapping region.
    spans.sort_by_key(|s| (s.kind == SpanKind::Token, s.start, s.end));
    let mut kept: Vec<MarkSpan> = Vec::new();
    for span in spans {
        if kept.iter().all(|k| span.end <= k.start || span.start >= k.end) {
            kept.push(span);
        }
    }
    kept.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(base.len());
    let mut cursor = 0;
    for span in kept {
        out.push_str(&base[cursor..span.start]);
        let covered = &base[span.start..span.end];
        match span.kind {
            SpanKind::Token => out.push_str(&token_marker(covered)),
            SpanKind::Error => out.push_str(&error_marker(covered, span.message.unwrap_or(""))),
        }
        cursor = span.end;
    }
    out.push_str(&base[cursor..]);
    out
}

/// Background-emphasis marker for a token occurrence.
fn token_marker(text: &str) -> String {
    format!("<span style=\"background-color:#c8f442\">{}</span>", text)
}

/// Popover marker carrying the error message as a tooltip. Double quotes in
/// the message would break the title attribute, so they are normalized to
/// single quotes.
fn error_marker(text: &str, message: &str) -> String {
    let message = message.replace('"', "'");
    format!(
        "<span style=\"background-color:#ed7171\" data-toggle=\"popover\" \
         data-trigger=\"hover\" title=\"{}\" data-placement=\"top\">{}</span>",
        message, text
    )
}
