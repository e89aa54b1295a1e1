//! The `search` → `summarize` / `cite` tool pipeline.
//!
//! [`ToolPipeline`] owns no state of its own: the [`SessionStore`] and both
//! oracles are injected at construction, so the same pipeline can run
//! against Elasticsearch + OpenAI in production and against stubs in tests.
//!
//! # Sequencing
//!
//! 1. `search` queries the [`RetrievalOracle`] and stores the ranked
//!    results under a session id (caller-supplied or freshly minted).
//! 2. `summarize` and `cite` read that context back. Without a prior
//!    successful `search` on the same id they fail with
//!    [`PipelineError::SessionNotFound`] and make no oracle call.
//!
//! The session store is written only after the retrieval oracle succeeded,
//! so a failed call never disturbs an existing session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::format;
use crate::models::{Citation, Context, ScoredDocument};
use crate::oracle::{
    CompletionRequest, FieldWeighting, RetrievalOracle, RetrievalRequest, SynthesisOracle,
};
use crate::session::{mint_session_id, SessionStore};

/// System instruction for summarization. The insufficiency clause is part of
/// the contract with the synthesis oracle.
pub const SUMMARY_INSTRUCTION: &str = "You are a research assistant. Answer the user's question \
using ONLY the information in the provided documents. Do not use outside knowledge. If the \
documents do not contain enough information to answer the question, say so explicitly.";

/// Separator between document blocks in the summarization prompt.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Tuning knobs for the pipeline, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// `max_results` used when a search does not specify one.
    pub default_max_results: usize,
    /// `max_length` used when a summarize call does not specify one.
    pub default_max_length: usize,
    /// Maximum number of documents included in a summarization prompt.
    pub summarize_doc_limit: usize,
    /// Excerpt length (in characters) in search narratives.
    pub excerpt_chars: usize,
    /// Upper bound on the synthesis token budget.
    pub max_tokens_cap: u32,
    /// Synthesis sampling temperature.
    pub temperature: f32,
    /// Field-weighting hints forwarded to the retrieval oracle.
    pub weighting: FieldWeighting,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_max_results: 5,
            default_max_length: 500,
            summarize_doc_limit: 5,
            excerpt_chars: 200,
            max_tokens_cap: 1000,
            temperature: 0.3,
            weighting: FieldWeighting::default(),
        }
    }
}

/// Parameters for [`ToolPipeline::search`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Parameters for [`ToolPipeline::summarize`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizeParams {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub max_length: Option<usize>,
}

/// Parameters for [`ToolPipeline::cite`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CiteParams {
    #[serde(default)]
    pub session_id: String,
}

/// Structured result of `search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub results: Vec<ScoredDocument>,
    /// Backend total match count, or `results.len()` when not reported.
    pub total: u64,
    pub session_id: String,
}

/// Structured result of `summarize`.
#[derive(Debug, Clone, Serialize)]
pub struct SummarizeOutput {
    pub summary: String,
    /// Size of the full stored context, not just the documents in the prompt.
    pub sources_used: usize,
}

/// Structured result of `cite`.
#[derive(Debug, Clone, Serialize)]
pub struct CiteOutput {
    pub citations: Vec<Citation>,
}

/// A tool result: display text plus the machine-readable form.
#[derive(Debug, Clone)]
pub struct ToolResponse<T> {
    pub narrative: String,
    pub data: T,
}

/// Orchestrates the three tools against a session store and two oracles.
pub struct ToolPipeline {
    sessions: Arc<dyn SessionStore>,
    retrieval: Arc<dyn RetrievalOracle>,
    synthesis: Arc<dyn SynthesisOracle>,
    settings: PipelineSettings,
}

impl ToolPipeline {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        retrieval: Arc<dyn RetrievalOracle>,
        synthesis: Arc<dyn SynthesisOracle>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            sessions,
            retrieval,
            synthesis,
            settings,
        }
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Retrieve ranked documents and store them as the session's context.
    pub async fn search(
        &self,
        params: SearchParams,
    ) -> Result<ToolResponse<SearchOutput>, PipelineError> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(PipelineError::invalid("query must not be empty"));
        }
        let limit = params
            .max_results
            .unwrap_or(self.settings.default_max_results);
        if limit == 0 {
            return Err(PipelineError::invalid("max_results must be >= 1"));
        }

        let request = RetrievalRequest {
            query: query.to_string(),
            limit,
            weighting: self.settings.weighting.clone(),
        };
        let response = self.retrieval.retrieve(&request).await.map_err(|e| {
            tracing::warn!(oracle = self.retrieval.name(), error = %e, "retrieval failed");
            PipelineError::oracle("retrieval", &e)
        })?;

        let results: Vec<ScoredDocument> = response
            .hits
            .into_iter()
            .map(|hit| ScoredDocument {
                document: hit.document,
                score: hit.score.unwrap_or(0.0),
                highlights: hit.highlights,
            })
            .collect();
        let total = response.total.unwrap_or(results.len() as u64);

        let session_id = match params.session_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => mint_session_id(),
        };
        self.sessions.put(&session_id, Context::from(results.as_slice()));

        tracing::info!(
            session_id = %session_id,
            results = results.len(),
            total,
            "search completed"
        );

        let narrative = format::search_narrative(
            query,
            &results,
            total,
            &session_id,
            self.settings.excerpt_chars,
        );
        Ok(ToolResponse {
            narrative,
            data: SearchOutput {
                results,
                total,
                session_id,
            },
        })
    }

    /// Answer a question from the session's stored documents.
    pub async fn summarize(
        &self,
        params: SummarizeParams,
    ) -> Result<ToolResponse<SummarizeOutput>, PipelineError> {
        if params.session_id.trim().is_empty() {
            return Err(PipelineError::invalid("session_id must not be empty"));
        }
        if params.question.trim().is_empty() {
            return Err(PipelineError::invalid("question must not be empty"));
        }
        let max_length = params
            .max_length
            .unwrap_or(self.settings.default_max_length);
        if max_length == 0 {
            return Err(PipelineError::invalid("max_length must be >= 1"));
        }

        let context = self.load_context(&params.session_id)?;
        let request = self.build_prompt(params.question.trim(), &context, max_length);

        let summary = self.synthesis.complete(&request).await.map_err(|e| {
            tracing::warn!(model = self.synthesis.model_name(), error = %e, "synthesis failed");
            PipelineError::oracle("synthesis", &e)
        })?;

        tracing::info!(
            session_id = %params.session_id,
            sources = context.len(),
            "summary generated"
        );

        Ok(ToolResponse {
            narrative: format::summary_narrative(&summary),
            data: SummarizeOutput {
                summary,
                sources_used: context.len(),
            },
        })
    }

    /// List citations for every document in the session's context.
    pub fn cite(&self, params: CiteParams) -> Result<ToolResponse<CiteOutput>, PipelineError> {
        if params.session_id.trim().is_empty() {
            return Err(PipelineError::invalid("session_id must not be empty"));
        }
        let context = self.load_context(&params.session_id)?;
        let citations: Vec<Citation> = context.iter().map(Citation::from).collect();

        Ok(ToolResponse {
            narrative: format::cite_narrative(&params.session_id, &citations),
            data: CiteOutput { citations },
        })
    }

    fn load_context(&self, session_id: &str) -> Result<Context, PipelineError> {
        match self.sessions.get(session_id) {
            Some(ctx) if !ctx.is_empty() => Ok(ctx),
            _ => {
                tracing::debug!(session_id, "session missing or empty");
                Err(PipelineError::SessionNotFound(session_id.to_string()))
            }
        }
    }

    /// Build the summarization request over the first `summarize_doc_limit`
    /// documents. Token budget is roughly one token per four characters.
    fn build_prompt(
        &self,
        question: &str,
        context: &[ScoredDocument],
        max_length: usize,
    ) -> CompletionRequest {
        let blocks: Vec<String> = context
            .iter()
            .take(self.settings.summarize_doc_limit)
            .enumerate()
            .map(|(i, d)| {
                format!(
                    "[Document {}: {}]\n{}",
                    i + 1,
                    d.document.title,
                    d.document.content
                )
            })
            .collect();

        let cap = self.settings.max_tokens_cap.max(1) as usize;
        let max_tokens = (max_length / 4).clamp(1, cap) as u32;

        CompletionRequest {
            system: SUMMARY_INSTRUCTION.to_string(),
            user: format!(
                "Documents:\n\n{}\n\nQuestion: {}\n\nAnswer in at most {} characters.",
                blocks.join(DOCUMENT_SEPARATOR),
                question,
                max_length
            ),
            max_tokens,
            temperature: self.settings.temperature,
        }
    }
}
