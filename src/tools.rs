//! Tool trait, registry, and the built-in `search`, `summarize`, `cite` tools.
//!
//! Every tool is dispatched the same way by both transports (REST and MCP):
//! look up by name in a [`ToolRegistry`], call [`Tool::execute`] with the
//! JSON arguments and a [`ToolContext`], and render the [`ToolOutput`].
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  ┌─────────┐ ┌───────────┐ ┌──────────┐ │
//! │  │ search  │ │ summarize │ │   cite   │ │
//! │  └────┬────┘ └─────┬─────┘ └────┬─────┘ │
//! └───────┼────────────┼────────────┼───────┘
//!         ▼            ▼            ▼
//!        ToolContext ──▶ ToolPipeline ──▶ SessionStore + oracles
//! ```
//!
//! Custom tools implement [`Tool`] and are registered next to the built-ins:
//!
//! ```rust
//! use rag_harness::tools::ToolRegistry;
//!
//! let mut tools = ToolRegistry::with_builtins();
//! // tools.register(Box::new(MyTool));
//! assert_eq!(tools.len(), 3);
//! ```

use anyhow::Result;
use async_trait::async_trait;
use rag_harness_core::pipeline::{CiteParams, SearchParams, SummarizeParams, ToolResponse};
use rag_harness_core::{PipelineError, ToolPipeline};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use rag_harness_core::session::MemorySessionStore;

use crate::config::Config;
use crate::retrieval::create_retrieval_oracle;
use crate::synthesis::create_synthesis_oracle;

/// A tool result: display narrative plus structured JSON.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Value,
}

impl ToolOutput {
    fn from_response<T: Serialize>(resp: ToolResponse<T>) -> Result<Self> {
        Ok(Self {
            text: resp.narrative,
            structured: serde_json::to_value(&resp.data)?,
        })
    }
}

/// Tool metadata as listed by `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool that agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the arguments.
    fn parameters_schema(&self) -> Value;

    /// Whether the tool only reads state. Search writes the session store.
    fn read_only(&self) -> bool {
        true
    }

    /// Execute with the caller's JSON arguments (always an object).
    ///
    /// Pipeline errors are returned as [`PipelineError`] inside the
    /// `anyhow::Error` so transports can classify them.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput>;

    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Bridge from a tool invocation to the shared pipeline.
///
/// Cheap to clone; one pipeline (and so one session store) serves every
/// request.
#[derive(Clone)]
pub struct ToolContext {
    pipeline: Arc<ToolPipeline>,
}

impl ToolContext {
    pub fn new(pipeline: Arc<ToolPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &ToolPipeline {
        &self.pipeline
    }
}

/// Build the pipeline described by `config`.
///
/// Constructs the session store once; every transport sharing the returned
/// pipeline sees the same sessions.
pub fn build_pipeline(config: &Config) -> Result<ToolPipeline> {
    let sessions = MemorySessionStore::new(&config.session.store_settings());
    let retrieval = create_retrieval_oracle(config)?;
    let synthesis = create_synthesis_oracle(&config.synthesis)?;

    tracing::info!(
        retrieval = retrieval.name(),
        synthesis = synthesis.model_name(),
        max_sessions = config.session.max_sessions,
        "pipeline ready"
    );

    Ok(ToolPipeline::new(
        Arc::new(sessions),
        retrieval,
        synthesis,
        config.pipeline_settings(),
    ))
}

/// Deserialize tool arguments, reporting shape errors as `InvalidArgument`.
fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|e| PipelineError::InvalidArgument(e.to_string()).into())
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

/// Built-in search tool. Delegates to [`ToolPipeline::search`].
pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the document index and start (or replace) a session's result set"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "max_results": { "type": "integer", "description": "Max results", "default": 5, "minimum": 1 },
                "session_id": { "type": "string", "description": "Session to store results under; minted when omitted" }
            },
            "required": ["query"]
        })
    }

    fn read_only(&self) -> bool {
        false
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let params: SearchParams = parse_params(params)?;
        let resp = ctx.pipeline().search(params).await?;
        ToolOutput::from_response(resp)
    }
}

/// Built-in summarize tool. Delegates to [`ToolPipeline::summarize`].
pub struct SummarizeTool;

#[async_trait]
impl Tool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> &str {
        "Answer a question from the documents found by the session's last search"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "session_id": { "type": "string", "description": "Session id returned by search" },
                "question": { "type": "string", "description": "Question to answer" },
                "max_length": { "type": "integer", "description": "Target answer length in characters", "default": 500, "minimum": 1 }
            },
            "required": ["session_id", "question"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let params: SummarizeParams = parse_params(params)?;
        let resp = ctx.pipeline().summarize(params).await?;
        ToolOutput::from_response(resp)
    }
}

/// Built-in cite tool. Delegates to [`ToolPipeline::cite`].
pub struct CiteTool;

#[async_trait]
impl Tool for CiteTool {
    fn name(&self) -> &str {
        "cite"
    }

    fn description(&self) -> &str {
        "List citations for every document in the session's last search"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "session_id": { "type": "string", "description": "Session id returned by search" }
            },
            "required": ["session_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let params: CiteParams = parse_params(params)?;
        let resp = ctx.pipeline().cite(params)?;
        ToolOutput::from_response(resp)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for built-in and custom tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry pre-loaded with `search`, `summarize`, and `cite`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(SummarizeTool));
        registry.register(Box::new(CiteTool));
        registry
    }

    /// Register a tool. A later tool with the same name is shadowed by the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
