//! Retrieval oracle bindings and index bootstrap.
//!
//! - **[`ElasticsearchOracle`]** — ranked full-text search over an
//!   Elasticsearch (or OpenSearch) index via its `_search` REST API.
//! - **`memory`** — [`InMemoryRetrievalOracle`] loaded from a JSON file.
//!
//! Use [`create_retrieval_oracle`] to pick the binding from config.
//!
//! # Query Shape
//!
//! ```json
//! {
//!   "size": 5,
//!   "query": { "bool": { "should": [
//!     { "multi_match": { "query": "…", "fields": ["title^3", "content", "tags"], "fuzziness": "AUTO" } },
//!     { "match_phrase": { "title": { "query": "…", "boost": 2.0 } } }
//!   ], "minimum_should_match": 1 } },
//!   "highlight": { "fields": { "content": {} } }
//! }
//! ```
//!
//! # Authentication
//!
//! If `RAG_ES_API_KEY` is set it is sent as `Authorization: ApiKey <key>`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rag_harness_core::oracle::memory::InMemoryRetrievalOracle;
use rag_harness_core::oracle::{
    RetrievalHit, RetrievalOracle, RetrievalRequest, RetrievalResponse,
};
use rag_harness_core::Document;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, RetrievalConfig};

/// Environment variable holding an Elasticsearch API key.
pub const API_KEY_ENV: &str = "RAG_ES_API_KEY";

/// Instantiate the retrieval oracle named by `retrieval.provider`.
pub fn create_retrieval_oracle(config: &Config) -> Result<Arc<dyn RetrievalOracle>> {
    match config.retrieval.provider.as_str() {
        "elasticsearch" => Ok(Arc::new(ElasticsearchOracle::new(&config.retrieval)?)),
        "memory" => {
            let path = config
                .retrieval
                .documents_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("retrieval.documents_path required for memory provider"))?;
            Ok(Arc::new(load_memory_oracle(path)?))
        }
        other => bail!("Unknown retrieval provider: {}", other),
    }
}

fn load_memory_oracle(path: &Path) -> Result<InMemoryRetrievalOracle> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    let oracle = InMemoryRetrievalOracle::from_json(&json)
        .with_context(|| format!("Invalid documents file: {}", path.display()))?;
    tracing::info!(documents = oracle.len(), path = %path.display(), "loaded in-memory index");
    Ok(oracle)
}

// ============ Elasticsearch ============

/// Retrieval oracle backed by an Elasticsearch index.
///
/// Holds one pooled HTTP client; safe to share across tasks.
pub struct ElasticsearchOracle {
    client: reqwest::Client,
    url: String,
    index: String,
    api_key: Option<String>,
}

impl ElasticsearchOracle {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key: std::env::var(API_KEY_ENV).ok(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}/{}", self.url, path));
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("ApiKey {}", key)),
            None => builder,
        }
    }

    /// Create the index with mappings for `id`, `title`, `content`, `tags`.
    ///
    /// Returns `false` if the index already existed.
    pub async fn create_index(&self) -> Result<bool> {
        let body = json!({
            "mappings": {
                "properties": {
                    "id": { "type": "long" },
                    "title": { "type": "text" },
                    "content": { "type": "text" },
                    "tags": { "type": "keyword" }
                }
            }
        });
        let resp = self
            .request(reqwest::Method::PUT, &self.index)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("PUT {}/{}", self.url, self.index))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(true);
        }
        if text.contains("resource_already_exists_exception") {
            return Ok(false);
        }
        bail!("Elasticsearch error {}: {}", status, text);
    }

    /// Bulk-index documents (by `id`) and refresh so they are searchable.
    pub async fn index_documents(&self, docs: &[Document]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let body = bulk_body(&self.index, docs)?;
        let resp = self
            .request(reqwest::Method::POST, "_bulk?refresh=true")
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST {}/_bulk", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Elasticsearch error {}: {}", status, text);
        }
        let json: Value = resp.json().await?;
        if json["errors"].as_bool().unwrap_or(false) {
            bail!("bulk indexing reported item errors: {}", first_bulk_error(&json));
        }
        Ok(docs.len())
    }
}

#[async_trait]
impl RetrievalOracle for ElasticsearchOracle {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResponse> {
        let path = format!("{}/_search", self.index);
        let resp = self
            .request(reqwest::Method::POST, &path)
            .json(&build_query(request))
            .send()
            .await
            .with_context(|| format!("POST {}/{}", self.url, path))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Elasticsearch error {}: {}", status, text);
        }
        let json: Value = resp.json().await?;
        parse_search_response(&json)
    }
}

/// Build the `_search` request body for a retrieval request.
pub fn build_query(request: &RetrievalRequest) -> Value {
    let w = &request.weighting;

    let mut multi_match = json!({
        "query": request.query,
        "fields": [format!("title^{}", w.title_boost), "content", "tags"],
    });
    if w.fuzzy {
        multi_match["fuzziness"] = json!("AUTO");
    }

    let mut body = json!({
        "size": request.limit,
        "query": {
            "bool": {
                "should": [
                    { "multi_match": multi_match },
                    { "match_phrase": { "title": { "query": request.query, "boost": w.phrase_boost } } }
                ],
                "minimum_should_match": 1
            }
        }
    });
    if w.highlight {
        body["highlight"] = json!({ "fields": { "content": {} } });
    }
    body
}

/// Parse an Elasticsearch `_search` response into ranked hits.
pub fn parse_search_response(json: &Value) -> Result<RetrievalResponse> {
    let hits = json
        .pointer("/hits/hits")
        .and_then(|h| h.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Elasticsearch response: missing hits.hits"))?;

    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let mut source = hit
            .get("_source")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Invalid Elasticsearch response: hit without _source"))?;

        // Fall back to the document _id when the source has no numeric id.
        if source.get("id").and_then(|v| v.as_i64()).is_none() {
            let id = hit
                .get("_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| anyhow::anyhow!("Invalid Elasticsearch hit: no integer id"))?;
            source["id"] = json!(id);
        }
        let document: Document =
            serde_json::from_value(source).context("Invalid Elasticsearch hit _source")?;

        let highlights = hit
            .pointer("/highlight/content")
            .and_then(|h| h.as_array())
            .map(|frags| {
                frags
                    .iter()
                    .filter_map(|f| f.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        out.push(RetrievalHit {
            document,
            score: hit.get("_score").and_then(|s| s.as_f64()),
            highlights,
        });
    }

    // ES 7+ reports {"value": n, "relation": ".."}; older versions a bare number.
    let total = json.pointer("/hits/total").and_then(|t| {
        t.get("value")
            .and_then(|v| v.as_u64())
            .or_else(|| t.as_u64())
    });

    Ok(RetrievalResponse { hits: out, total })
}

fn bulk_body(index: &str, docs: &[Document]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        body.push_str(&serde_json::to_string(
            &json!({ "index": { "_index": index, "_id": doc.id.to_string() } }),
        )?);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

fn first_bulk_error(json: &Value) -> String {
    json["items"]
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .find_map(|item| item.pointer("/index/error/reason").and_then(|r| r.as_str()))
        })
        .unwrap_or("unknown error")
        .to_string()
}

// ============ CLI: rag index ============

/// CLI entry point for `rag index init`.
pub async fn run_index_init(config: &Config) -> Result<()> {
    let oracle = ElasticsearchOracle::new(&config.retrieval)?;
    if oracle.create_index().await? {
        println!("Created index '{}'.", config.retrieval.index);
    } else {
        println!("Index '{}' already exists.", config.retrieval.index);
    }
    Ok(())
}

/// CLI entry point for `rag index load <file>`.
pub async fn run_index_load(config: &Config, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    let docs: Vec<Document> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid documents file: {}", path.display()))?;

    let oracle = ElasticsearchOracle::new(&config.retrieval)?;
    let count = oracle.index_documents(&docs).await?;
    println!("Indexed {} documents into '{}'.", count, config.retrieval.index);
    Ok(())
}
