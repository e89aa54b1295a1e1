//! HTTP server exposing the tools over REST and MCP.
//!
//! All tools are registered in one [`ToolRegistry`] and dispatched through
//! the same pipeline, so a session created by `search` over REST is visible
//! to `cite` over MCP and vice versa.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, live session count) |
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool; returns `{ "result": …, "text": … }` |
//! | `*`    | `/mcp` | MCP Streamable HTTP endpoint |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "session_not_found", "message": "session not found: …" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `invalid_argument` | 400 |
//! | `session_not_found` | 404 |
//! | `not_found` (unknown tool) | 404 |
//! | `oracle_failure` | 502 |
//! | `internal` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::mcp::McpBridge;
use crate::tools::{build_pipeline, ToolContext, ToolInfo, ToolRegistry};
use rag_harness_core::{PipelineError, ToolPipeline};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

/// Starts the server with the built-in tools.
///
/// Builds the pipeline from `config` and binds to `[server].bind`. Runs
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    run_server_with_pipeline(config, Arc::new(pipeline), ToolRegistry::with_builtins()).await
}

/// Starts the server around an already-built pipeline and tool set.
///
/// Used by tests and by binaries that inject their own oracles or
/// register extra tools.
///
/// ```rust,no_run
/// use rag_harness::server::run_server_with_pipeline;
/// use rag_harness::tools::{build_pipeline, ToolRegistry};
/// use std::sync::Arc;
///
/// # async fn example(config: &rag_harness::config::Config) -> anyhow::Result<()> {
/// let pipeline = Arc::new(build_pipeline(config)?);
/// let mut tools = ToolRegistry::with_builtins();
/// // tools.register(Box::new(MyTool));
/// run_server_with_pipeline(config, pipeline, tools).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_pipeline(
    config: &Config,
    pipeline: Arc<ToolPipeline>,
    tools: ToolRegistry,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    for t in tools.tools() {
        tracing::debug!(tool = t.name(), "registered tool");
    }

    let app = router(pipeline, Arc::new(tools));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{} (MCP at /mcp)", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the axum router: REST routes plus the MCP service at `/mcp`.
pub fn router(pipeline: Arc<ToolPipeline>, tools: Arc<ToolRegistry>) -> Router {
    let ctx = ToolContext::new(pipeline);

    let bridge = McpBridge::new(tools.clone(), ctx.clone());
    let mcp = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .nest_service("/mcp", mcp)
        .layer(cors)
        .with_state(AppState { ctx, tools })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::OracleFailure { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// Map a tool error to a status and code. Pipeline errors keep their own
/// code; anything else is `internal`.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    match err.downcast_ref::<PipelineError>() {
        Some(e) => AppError::new(status_for(e), e.code(), e.to_string()),
        None => AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("{}: {:#}", tool_name, err),
        ),
    }
}

/// Parse a request body into a JSON object. An empty body is `{}`.
fn parse_body(body: &Bytes) -> Result<serde_json::Value, AppError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(serde_json::json!({}));
    }
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "invalid_argument",
            format!("invalid JSON body: {}", e),
        )
    })?;
    if !value.is_object() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "invalid_argument",
            "request body must be a JSON object",
        ));
    }
    Ok(value)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Live sessions in the store.
    sessions: u64,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.ctx.pipeline().sessions().len(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state.tools.tools().iter().map(|t| t.info()).collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Unified tool dispatch.
///
/// Returns `{ "result": <structured>, "text": <narrative> }` on success.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    let params = parse_body(&body)?;

    let output = tool.execute(params, &state.ctx).await.map_err(|e| {
        tracing::warn!(tool = %name, error = %e, "tool call failed");
        classify_tool_error(&name, e)
    })?;

    Ok(Json(serde_json::json!({
        "result": output.structured,
        "text": output.text,
    })))
}
