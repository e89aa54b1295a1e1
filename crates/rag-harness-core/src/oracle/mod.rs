//! Capability traits for the two external collaborators.
//!
//! The pipeline treats ranked retrieval and text synthesis as opaque
//! oracles. Each is a single-method trait so production bindings
//! (Elasticsearch, OpenAI, Ollama) and deterministic test stubs are
//! interchangeable.
//!
//! Concrete HTTP implementations live in the `rag-harness` app crate.
//! [`memory::InMemoryRetrievalOracle`] is provided here for local use and
//! tests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

/// Field-weighting policy the retrieval oracle is asked to apply.
///
/// The pipeline only forwards these hints; ranking itself is the oracle's
/// business.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWeighting {
    /// Multiplier applied to title matches relative to content and tags.
    pub title_boost: f64,
    /// Tolerate minor misspellings.
    pub fuzzy: bool,
    /// Extra boost for an exact phrase match in the title.
    pub phrase_boost: f64,
    /// Request highlighted content fragments.
    pub highlight: bool,
}

impl Default for FieldWeighting {
    fn default() -> Self {
        Self {
            title_boost: 3.0,
            fuzzy: true,
            phrase_boost: 2.0,
            highlight: true,
        }
    }
}

/// A ranked retrieval request.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub limit: usize,
    pub weighting: FieldWeighting,
}

/// One ranked hit from the retrieval oracle.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub document: Document,
    /// `None` when the backend did not score the hit.
    pub score: Option<f64>,
    pub highlights: Vec<String>,
}

/// Hits in descending relevance order plus the backend's total match count.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResponse {
    pub hits: Vec<RetrievalHit>,
    pub total: Option<u64>,
}

/// Ranked full-text retrieval.
#[async_trait]
pub trait RetrievalOracle: Send + Sync {
    /// Short backend name for logs (e.g. `"elasticsearch"`).
    fn name(&self) -> &str;

    /// Run a ranked query, returning at most `request.limit` hits.
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResponse>;
}

/// A role-structured completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction.
    pub system: String,
    /// User content (documents + question).
    pub user: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature; low values are near-deterministic.
    pub temperature: f32,
}

/// Free-text completion.
#[async_trait]
pub trait SynthesisOracle: Send + Sync {
    /// Model identifier for logs (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for the request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
