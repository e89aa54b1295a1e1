//! Narrative rendering for tool responses.
//!
//! Every tool returns a human-readable narrative next to its structured
//! result. Scores are shown with two decimals; the structured form keeps
//! the raw value.

use std::fmt::Write as _;

use crate::models::{Citation, ScoredDocument};

/// Marker prepended to synthesized text.
pub const AI_GENERATED_MARKER: &str = "[AI generated]";

/// Appended to excerpts that were cut short.
pub const ELLIPSIS: &str = "...";

/// First `max_chars` characters of `content`, with [`ELLIPSIS`] appended
/// only when something was cut.
///
/// Counts Unicode scalar values, so multi-byte text is never split.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], ELLIPSIS),
        None => content.to_string(),
    }
}

/// Narrative for a search result set.
pub fn search_narrative(
    query: &str,
    results: &[ScoredDocument],
    total: u64,
    session_id: &str,
    excerpt_chars: usize,
) -> String {
    if results.is_empty() {
        return format!(
            "No results found for \"{}\".\nSession ID: {}",
            query, session_id
        );
    }

    let mut out = format!(
        "Found {} results (of {} matches) for \"{}\".\nSession ID: {}\n",
        results.len(),
        total,
        query,
        session_id
    );
    for (i, doc) in results.iter().enumerate() {
        let snippet = excerpt(&doc.document.content, excerpt_chars);
        let _ = write!(
            out,
            "\n{}. {} (score: {:.2})\n   {}\n",
            i + 1,
            doc.document.title,
            doc.score,
            snippet.replace('\n', " ").trim()
        );
    }
    out
}

/// Narrative for a synthesized answer.
pub fn summary_narrative(summary: &str) -> String {
    format!("{} {}", AI_GENERATED_MARKER, summary)
}

/// Narrative for a citation list.
pub fn cite_narrative(session_id: &str, citations: &[Citation]) -> String {
    let mut out = format!("Sources for session {}:\n", session_id);
    for (i, c) in citations.iter().enumerate() {
        let tags = if c.tags.is_empty() {
            "(none)".to_string()
        } else {
            c.tags.join(", ")
        };
        let _ = writeln!(
            out,
            "{}. [{}] \"{}\" tags: {} (score: {:.2})",
            i + 1,
            c.id,
            c.title,
            tags,
            c.relevance_score
        );
    }
    out
}
