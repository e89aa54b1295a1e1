//! # RAG Harness
//!
//! A retrieval-augmented research tool surface for AI agents.
//!
//! Three tools share a session store: `search` queries a document index and
//! remembers the results under a session id, `summarize` answers a question
//! from those documents with a language model, and `cite` lists their
//! sources. The tools are served over REST and MCP and are also available
//! from the `rag` CLI.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!  │   CLI    │  │   REST   │  │   MCP    │
//!  │  (rag)   │  │ /tools/* │  │  /mcp    │
//!  └────┬─────┘  └────┬─────┘  └────┬─────┘
//!       └─────────────┼─────────────┘
//!                     ▼
//!              ┌──────────────┐      ┌──────────────┐
//!              │ ToolPipeline │─────▶│ SessionStore │
//!              └──┬────────┬──┘      └──────────────┘
//!                 ▼        ▼
//!         ┌───────────┐ ┌───────────┐
//!         │ Retrieval │ │ Synthesis │
//!         │ ES/memory │ │ OpenAI/   │
//!         └───────────┘ │ Ollama    │
//!                       └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag index init                      # create the Elasticsearch index
//! rag index load ./docs.json          # bulk-load documents
//! rag search "vector databases"
//! rag serve                           # REST + MCP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`retrieval`] | Elasticsearch and in-memory retrieval oracles |
//! | [`synthesis`] | OpenAI, Ollama, and disabled synthesis oracles |
//! | [`tools`] | Tool trait, registry, built-in tools, pipeline factory |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | HTTP server (REST + MCP) |
//!
//! The runtime-free pieces (session store, pipeline, oracle traits,
//! narratives) live in the `rag-harness-core` crate.

pub mod config;
pub mod logging;
pub mod mcp;
pub mod retrieval;
pub mod server;
pub mod synthesis;
pub mod tools;
