//! In-memory [`RetrievalOracle`] for local use and tests.
//!
//! Brute-force term matching over a fixed document set. Honors the
//! [`FieldWeighting`] hints in a simplified way:
//!
//! - each query term found in the title scores `title_boost`, in content or
//!   tags scores `1.0`;
//! - with `fuzzy`, terms of 5+ characters also match words one edit away,
//!   at half weight;
//! - the whole query appearing verbatim in the title adds `phrase_boost`.

use anyhow::{Context as _, Result};
use async_trait::async_trait;

use crate::models::Document;

use super::{FieldWeighting, RetrievalHit, RetrievalOracle, RetrievalRequest, RetrievalResponse};

/// Shortest term eligible for fuzzy matching.
const FUZZY_MIN_LEN: usize = 5;
/// Characters of context on each side of a highlighted term.
const HIGHLIGHT_RADIUS: usize = 60;

/// Retrieval oracle over an in-memory document list.
pub struct InMemoryRetrievalOracle {
    docs: Vec<Document>,
}

impl InMemoryRetrievalOracle {
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }

    /// Build from a JSON array of documents.
    pub fn from_json(json: &str) -> Result<Self> {
        let docs: Vec<Document> =
            serde_json::from_str(json).context("Failed to parse documents JSON")?;
        Ok(Self::new(docs))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn score(&self, doc: &Document, terms: &[String], phrase: &str, w: &FieldWeighting) -> f64 {
        let title = tokenize(&doc.title);
        let content = tokenize(&doc.content);
        let tags: Vec<String> = doc.tags.iter().flat_map(|t| tokenize(t)).collect();

        let mut score = 0.0;
        for term in terms {
            score += w.title_boost * field_match(term, &title, w.fuzzy);
            score += field_match(term, &content, w.fuzzy);
            score += field_match(term, &tags, w.fuzzy);
        }
        if score > 0.0 && !phrase.is_empty() && doc.title.to_lowercase().contains(phrase) {
            score += w.phrase_boost;
        }
        score
    }
}

#[async_trait]
impl RetrievalOracle for InMemoryRetrievalOracle {
    fn name(&self) -> &str {
        "memory"
    }

    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResponse> {
        let terms = tokenize(&request.query);
        if terms.is_empty() {
            return Ok(RetrievalResponse {
                hits: Vec::new(),
                total: Some(0),
            });
        }
        let phrase = terms.join(" ");

        let mut scored: Vec<(&Document, f64)> = self
            .docs
            .iter()
            .map(|d| (d, self.score(d, &terms, &phrase, &request.weighting)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.id.cmp(&b.0.id))
        });

        let total = scored.len() as u64;
        let hits = scored
            .into_iter()
            .take(request.limit)
            .map(|(doc, score)| RetrievalHit {
                highlights: if request.weighting.highlight {
                    highlight(&doc.content, &terms).into_iter().collect()
                } else {
                    Vec::new()
                },
                document: doc.clone(),
                score: Some(score),
            })
            .collect();

        Ok(RetrievalResponse {
            hits,
            total: Some(total),
        })
    }
}

/// Lowercased alphanumeric words.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// 1.0 for an exact word match, 0.5 for a fuzzy one, 0.0 otherwise.
fn field_match(term: &str, words: &[String], fuzzy: bool) -> f64 {
    if words.iter().any(|w| w == term) {
        1.0
    } else if fuzzy
        && term.chars().count() >= FUZZY_MIN_LEN
        && words.iter().any(|w| within_one_edit(term, w))
    {
        0.5
    } else {
        0.0
    }
}

/// True if `a` and `b` differ by at most one insertion, deletion, or substitution.
fn within_one_edit(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if long.len() - short.len() > 1 {
        return false;
    }

    let mut i = 0;
    let mut j = 0;
    let mut edits = 0;
    while i < short.len() && j < long.len() {
        if short[i] == long[j] {
            i += 1;
            j += 1;
            continue;
        }
        edits += 1;
        if edits > 1 {
            return false;
        }
        if short.len() == long.len() {
            i += 1;
        }
        j += 1;
    }
    edits + (long.len() - j) + (short.len() - i) <= 1
}

/// A window of `content` around the first exact term match, with the term
/// wrapped in `<em>` tags.
fn highlight(content: &str, terms: &[String]) -> Option<String> {
    let (start, end) = terms
        .iter()
        .filter_map(|t| find_word(content, t))
        .min_by_key(|(pos, _)| *pos)?;

    let from = floor_char_boundary(content, start.saturating_sub(HIGHLIGHT_RADIUS));
    let to = ceil_char_boundary(content, (end + HIGHLIGHT_RADIUS).min(content.len()));
    Some(format!(
        "{}<em>{}</em>{}",
        &content[from..start],
        &content[start..end],
        &content[end..to]
    ))
}

/// Byte range in `text` of the first case-insensitive match of the
/// lowercase `word` at word boundaries. Offsets always fall on `text`'s own
/// char boundaries.
fn find_word(text: &str, word: &str) -> Option<(usize, usize)> {
    text.char_indices().find_map(|(pos, _)| {
        let end = match_at(text, pos, word)?;
        let before = text[..pos].chars().next_back();
        let after = text[end..].chars().next();
        (!before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric))
            .then_some((pos, end))
    })
}

/// End offset if `text[start..]` lowercases to something starting with
/// `word`, ending on a whole character of `text`.
fn match_at(text: &str, start: usize, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let mut want = word.chars().peekable();
    for (off, c) in text[start..].char_indices() {
        if want.peek().is_none() {
            return Some(start + off);
        }
        for lc in c.to_lowercase() {
            if want.next() != Some(lc) {
                return None;
            }
        }
    }
    want.peek().is_none().then_some(text.len())
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i64, title: &str, content: &str, tags: &[&str]) -> Document {
        Document {
            id,
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn request(query: &str, limit: usize) -> RetrievalRequest {
        RetrievalRequest {
            query: query.to_string(),
            limit,
            weighting: FieldWeighting::default(),
        }
    }

    fn corpus() -> InMemoryRetrievalOracle {
        InMemoryRetrievalOracle::new(vec![
            doc(1, "Cooking pasta", "Boil water and add databases of flavor.", &["food"]),
            doc(2, "Vector databases", "Approximate nearest neighbour search.", &["db"]),
            doc(3, "Relational systems", "Tables, joins and vector extensions.", &["db", "sql"]),
        ])
    }

    #[tokio::test]
    async fn test_title_match_ranks_first() {
        let oracle = corpus();
        let resp = oracle.retrieve(&request("vector databases", 10)).await.unwrap();
        let ids: Vec<i64> = resp.hits.iter().map(|h| h.document.id).collect();
        assert_eq!(ids[0], 2);
        assert_eq!(resp.total, Some(3));
    }

    #[tokio::test]
    async fn test_limit_truncates_but_total_counts_all() {
        let oracle = corpus();
        let resp = oracle.retrieve(&request("databases vector", 1)).await.unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.total, Some(3));
    }

    #[tokio::test]
    async fn test_fuzzy_matches_misspelling() {
        let oracle = corpus();
        let resp = oracle.retrieve(&request("databses", 10)).await.unwrap();
        assert!(resp.hits.iter().any(|h| h.document.id == 2));

        let mut strict = request("databses", 10);
        strict.weighting.fuzzy = false;
        let resp = oracle.retrieve(&strict).await.unwrap();
        assert!(resp.hits.is_empty());
    }

    #[tokio::test]
    async fn test_tag_match() {
        let oracle = corpus();
        let resp = oracle.retrieve(&request("sql", 10)).await.unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.hits[0].document.id, 3);
    }

    #[tokio::test]
    async fn test_highlight_wraps_term() {
        let oracle = corpus();
        let resp = oracle.retrieve(&request("neighbour", 10)).await.unwrap();
        assert_eq!(resp.hits[0].highlights.len(), 1);
        assert!(resp.hits[0].highlights[0].contains("<em>neighbour</em>"));
    }

    #[tokio::test]
    async fn test_highlight_with_length_changing_case_folds() {
        // "İ" grows and "ẞ" shrinks when lowercased; offsets must still
        // land on the original text's char boundaries.
        let oracle = InMemoryRetrievalOracle::new(vec![doc(
            1,
            "Unicode",
            "İ évector ẞ",
            &[],
        )]);
        let resp = oracle.retrieve(&request("évector", 5)).await.unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.hits[0].highlights, vec!["İ <em>évector</em> ẞ"]);
    }

    #[test]
    fn test_find_word_is_case_insensitive_on_original_offsets() {
        assert_eq!(find_word("Vector DBs", "vector"), Some((0, 6)));
        assert_eq!(find_word("ẞ Straße", "straße"), Some((4, 11)));
        assert_eq!(find_word("vectors", "vector"), None);
        assert_eq!(find_word("", "vector"), None);
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let oracle = corpus();
        let resp = oracle.retrieve(&request("  !! ", 10)).await.unwrap();
        assert!(resp.hits.is_empty());
        assert_eq!(resp.total, Some(0));
    }

    #[test]
    fn test_within_one_edit() {
        assert!(within_one_edit("vector", "vector"));
        assert!(within_one_edit("vector", "vectors"));
        assert!(within_one_edit("vector", "vecor"));
        assert!(within_one_edit("vector", "vextor"));
        assert!(!within_one_edit("vector", "victory"));
        assert!(!within_one_edit("vector", "vec"));
    }

    #[test]
    fn test_from_json() {
        let oracle = InMemoryRetrievalOracle::from_json(
            r#"[{"id": 1, "title": "A", "content": "a"}, {"id": 2, "title": "B", "content": "b", "tags": ["x"]}]"#,
        )
        .unwrap();
        assert_eq!(oracle.len(), 2);
        assert!(InMemoryRetrievalOracle::from_json("{}").is_err());
    }
}
