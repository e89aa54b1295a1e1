//! Error taxonomy for the tool pipeline.
//!
//! Every pipeline failure is recoverable: the caller fixes its input, runs
//! `search` first, or retries after an oracle outage. None of them leave the
//! session store in a partially written state.

use thiserror::Error;

/// Errors surfaced by [`ToolPipeline`](crate::pipeline::ToolPipeline).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// A required field was missing, empty, or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No non-empty context is stored under the session id.
    #[error("session not found: {0}. Call search first to create a session")]
    SessionNotFound(String),

    /// The retrieval or synthesis oracle failed.
    #[error("{oracle} oracle failed: {message}")]
    OracleFailure {
        oracle: &'static str,
        message: String,
    },
}

impl PipelineError {
    /// Machine-readable error code used by the REST transport.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::SessionNotFound(_) => "session_not_found",
            Self::OracleFailure { .. } => "oracle_failure",
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wrap an oracle error, keeping the full `anyhow` context chain.
    pub(crate) fn oracle(oracle: &'static str, err: &anyhow::Error) -> Self {
        Self::OracleFailure {
            oracle,
            message: format!("{:#}", err),
        }
    }
}
