//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Default filter when `RAG_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "rag_harness=info,rag_harness_core=info";

/// Initialize logging to stderr.
///
/// Reads the `RAG_LOG` environment variable for per-module levels, e.g.
/// `RAG_LOG=rag_harness=debug,rag_harness_core=debug,rmcp=warn`.
///
/// Idempotent; only the first call installs the subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("RAG_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
