//! TOML configuration parsing and validation.
//!
//! Every section has defaults, so an empty file is a valid config that
//! serves the in-process tools with synthesis disabled. See
//! [`load_config`] for the validation rules.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [session]
//! max_sessions = 10000
//! idle_ttl_secs = 3600
//!
//! [retrieval]
//! provider = "elasticsearch"
//! url = "http://localhost:9200"
//! index = "documents"
//!
//! [synthesis]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! ```

use anyhow::{Context, Result};
use rag_harness_core::oracle::FieldWeighting;
use rag_harness_core::session::SessionStoreSettings;
use rag_harness_core::PipelineSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Bounds on the in-memory session store. A TTL of `0` disables that expiry.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_ttl_secs: default_idle_ttl_secs(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_sessions() -> u64 {
    10_000
}
fn default_idle_ttl_secs() -> u64 {
    3600
}
fn default_ttl_secs() -> u64 {
    86_400
}

impl SessionConfig {
    pub fn store_settings(&self) -> SessionStoreSettings {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        SessionStoreSettings {
            max_sessions: self.max_sessions,
            idle_ttl: secs(self.idle_ttl_secs),
            ttl: secs(self.ttl_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    #[serde(default = "default_max_length")]
    pub default_max_length: usize,
    #[serde(default = "default_summarize_doc_limit")]
    pub summarize_doc_limit: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            default_max_length: default_max_length(),
            summarize_doc_limit: default_summarize_doc_limit(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_max_results() -> usize {
    5
}
fn default_max_length() -> usize {
    500
}
fn default_summarize_doc_limit() -> usize {
    5
}
fn default_excerpt_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_provider")]
    pub provider: String,
    #[serde(default = "default_es_url")]
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_title_boost")]
    pub title_boost: f64,
    #[serde(default = "default_phrase_boost")]
    pub phrase_boost: f64,
    #[serde(default = "default_true")]
    pub fuzzy: bool,
    #[serde(default = "default_true")]
    pub highlight: bool,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
    /// JSON array of documents for the `memory` provider.
    #[serde(default)]
    pub documents_path: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            provider: default_retrieval_provider(),
            url: default_es_url(),
            index: default_index(),
            title_boost: default_title_boost(),
            phrase_boost: default_phrase_boost(),
            fuzzy: true,
            highlight: true,
            timeout_secs: default_retrieval_timeout_secs(),
            documents_path: None,
        }
    }
}

fn default_retrieval_provider() -> String {
    "elasticsearch".to_string()
}
fn default_es_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_index() -> String {
    "documents".to_string()
}
fn default_title_boost() -> f64 {
    3.0
}
fn default_phrase_boost() -> f64 {
    2.0
}
fn default_true() -> bool {
    true
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}

impl RetrievalConfig {
    pub fn weighting(&self) -> FieldWeighting {
        FieldWeighting {
            title_boost: self.title_boost,
            fuzzy: self.fuzzy,
            phrase_boost: self.phrase_boost,
            highlight: self.highlight,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL; defaults per provider when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: u32,
    #[serde(default = "default_synthesis_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: default_synthesis_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_tokens_cap: default_max_tokens_cap(),
            timeout_secs: default_synthesis_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_synthesis_provider() -> String {
    "disabled".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens_cap() -> u32 {
    1000
}
fn default_synthesis_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl SynthesisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// A config with every default applied, for commands and tests that run
    /// without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            default_max_results: self.pipeline.default_max_results,
            default_max_length: self.pipeline.default_max_length,
            summarize_doc_limit: self.pipeline.summarize_doc_limit,
            excerpt_chars: self.pipeline.excerpt_chars,
            max_tokens_cap: self.synthesis.max_tokens_cap,
            temperature: self.synthesis.temperature,
            weighting: self.retrieval.weighting(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate session
    if config.session.max_sessions == 0 {
        anyhow::bail!("session.max_sessions must be >= 1");
    }

    // Validate pipeline
    let p = &config.pipeline;
    if p.default_max_results == 0 {
        anyhow::bail!("pipeline.default_max_results must be >= 1");
    }
    if p.default_max_length == 0 {
        anyhow::bail!("pipeline.default_max_length must be >= 1");
    }
    if p.summarize_doc_limit == 0 {
        anyhow::bail!("pipeline.summarize_doc_limit must be >= 1");
    }
    if p.excerpt_chars == 0 {
        anyhow::bail!("pipeline.excerpt_chars must be >= 1");
    }

    // Validate retrieval
    let r = &config.retrieval;
    if r.title_boost <= 0.0 || r.phrase_boost <= 0.0 {
        anyhow::bail!("retrieval.title_boost and retrieval.phrase_boost must be > 0");
    }
    match r.provider.as_str() {
        "elasticsearch" => {
            if r.index.trim().is_empty() {
                anyhow::bail!("retrieval.index must not be empty");
            }
        }
        "memory" => {
            if r.documents_path.is_none() {
                anyhow::bail!("retrieval.documents_path must be set when provider is 'memory'");
            }
        }
        other => anyhow::bail!(
            "Unknown retrieval provider: '{}'. Must be elasticsearch or memory.",
            other
        ),
    }

    // Validate synthesis
    let s = &config.synthesis;
    if !(0.0..=2.0).contains(&s.temperature) {
        anyhow::bail!("synthesis.temperature must be in [0.0, 2.0]");
    }
    if s.max_tokens_cap == 0 {
        anyhow::bail!("synthesis.max_tokens_cap must be >= 1");
    }
    match s.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if s.model.is_none() {
                anyhow::bail!(
                    "synthesis.model must be specified when provider is '{}'",
                    s.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown synthesis provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
