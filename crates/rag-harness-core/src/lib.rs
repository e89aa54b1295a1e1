//! # RAG Harness Core
//!
//! Runtime-free logic for RAG Harness: data models, the session store,
//! oracle capability traits, and the [`pipeline::ToolPipeline`] that backs
//! the `search`, `summarize`, and `cite` tools.
//!
//! This crate contains no tokio, HTTP clients, or filesystem I/O. The
//! application crate supplies concrete oracles (Elasticsearch, OpenAI,
//! Ollama) and the transports (REST, MCP).
//!
//! ## Data Flow
//!
//! ```text
//! search ──▶ RetrievalOracle ──▶ SessionStore.put(id, context)
//!                                        │
//! summarize ◀── SessionStore.get(id) ◀───┤──▶ SynthesisOracle
//! cite      ◀── SessionStore.get(id) ◀───┘
//! ```

pub mod error;
pub mod format;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod session;

pub use error::PipelineError;
pub use models::{Citation, Context, Document, ScoredDocument};
pub use pipeline::{PipelineSettings, ToolPipeline};
