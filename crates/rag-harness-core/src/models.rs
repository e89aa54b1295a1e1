//! Core data models shared by the pipeline, the oracles, and the transports.
//!
//! Documents are owned by the retrieval oracle; the pipeline only wraps them
//! with a score and stores the ranked list as an immutable [`Context`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A document as returned by the retrieval oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A [`Document`] together with the relevance score from one query.
///
/// Scores are only comparable within the result set of a single search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    /// Non-negative relevance score in oracle-defined units.
    pub score: f64,
    /// Highlighted content fragments, when the oracle returned any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

/// The ranked, immutable result set of one search, stored under a session id.
///
/// Cloning a `Context` only bumps a reference count, so readers always get
/// a complete snapshot.
pub type Context = Arc<[ScoredDocument]>;

/// Attribution-only projection of a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub relevance_score: f64,
}

impl From<&ScoredDocument> for Citation {
    fn from(doc: &ScoredDocument) -> Self {
        Self {
            id: doc.document.id,
            title: doc.document.title.clone(),
            tags: doc.document.tags.clone(),
            relevance_score: doc.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_document_serializes_flat() {
        let doc = ScoredDocument {
            document: Document {
                id: 7,
                title: "Vector Databases".to_string(),
                content: "HNSW graphs".to_string(),
                tags: vec!["db".to_string()],
            },
            score: 1.5,
            highlights: Vec::new(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["title"], "Vector Databases");
        assert_eq!(json["score"], 1.5);
        assert!(json.get("highlights").is_none());
        assert!(json.get("document").is_none());
    }

    #[test]
    fn test_citation_projection() {
        let doc = ScoredDocument {
            document: Document {
                id: 3,
                title: "Rust".to_string(),
                content: "ownership".to_string(),
                tags: vec!["lang".to_string(), "systems".to_string()],
            },
            score: 4.25,
            highlights: vec!["<em>ownership</em>".to_string()],
        };
        let citation = Citation::from(&doc);
        assert_eq!(citation.id, 3);
        assert_eq!(citation.title, "Rust");
        assert_eq!(citation.tags, vec!["lang", "systems"]);
        assert_eq!(citation.relevance_score, 4.25);
    }
}
