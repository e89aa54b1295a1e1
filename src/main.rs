//! # RAG Harness CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag serve` | Start the REST + MCP server |
//! | `rag search "<query>"` | Search and print the narrative with its session id |
//! | `rag ask "<question>" --query "<q>"` | Search, summarize, and cite in one go |
//! | `rag tools` | List the registered tools |
//! | `rag index init` | Create the Elasticsearch index |
//! | `rag index load <file.json>` | Bulk-load documents into the index |
//!
//! Set `RAG_LOG` to adjust log levels (e.g. `RAG_LOG=rag_harness=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rag_harness::config;
use rag_harness::logging::init_tracing;
use rag_harness::retrieval;
use rag_harness::server;
use rag_harness::tools::{build_pipeline, ToolRegistry};
use rag_harness_core::pipeline::{CiteParams, SearchParams, SummarizeParams};

/// RAG Harness CLI: search, summarize, and cite over a document index.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "RAG Harness — search, summarize, and cite tools for AI agents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (REST at /tools, MCP at /mcp).
    Serve,

    /// Search the index and print results with the session id.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Session id to store results under (minted when omitted).
        #[arg(long)]
        session: Option<String>,
    },

    /// Search, then answer a question from the results and list sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Search query; defaults to the question.
        #[arg(long)]
        query: Option<String>,

        /// Maximum number of documents to retrieve.
        #[arg(long)]
        limit: Option<usize>,

        /// Target answer length in characters.
        #[arg(long)]
        max_length: Option<usize>,
    },

    /// List registered tools and their parameters.
    Tools,

    /// Manage the Elasticsearch index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create the index with its mapping. Idempotent.
    Init,
    /// Bulk-load a JSON array of documents.
    Load {
        /// Path to a JSON file: `[{"id":1,"title":"…","content":"…","tags":[…]}]`.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Listing tools needs no config
    if let Commands::Tools = cli.command {
        for t in ToolRegistry::with_builtins().tools() {
            println!("{} — {}", t.name(), t.description());
            println!("  {}", serde_json::to_string(&t.parameters_schema())?);
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search {
            query,
            limit,
            session,
        } => {
            let pipeline = build_pipeline(&cfg)?;
            let resp = pipeline
                .search(SearchParams {
                    query,
                    max_results: limit,
                    session_id: session,
                })
                .await?;
            println!("{}", resp.narrative);
        }
        Commands::Ask {
            question,
            query,
            limit,
            max_length,
        } => {
            let pipeline = build_pipeline(&cfg)?;
            let found = pipeline
                .search(SearchParams {
                    query: query.unwrap_or_else(|| question.clone()),
                    max_results: limit,
                    session_id: None,
                })
                .await?;
            let session_id = found.data.session_id;

            if found.data.results.is_empty() {
                println!("{}", found.narrative);
                return Ok(());
            }

            let summary = pipeline
                .summarize(SummarizeParams {
                    session_id: session_id.clone(),
                    question,
                    max_length,
                })
                .await?;
            println!("{}\n", summary.narrative);

            let sources = pipeline.cite(CiteParams { session_id })?;
            println!("{}", sources.narrative);
        }
        Commands::Index { action } => match action {
            IndexAction::Init => retrieval::run_index_init(&cfg).await?,
            IndexAction::Load { path } => retrieval::run_index_load(&cfg, &path).await?,
        },
        Commands::Tools => {}
    }

    Ok(())
}
