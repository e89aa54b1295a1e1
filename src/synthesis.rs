//! Synthesis oracle bindings.
//!
//! - **[`DisabledSynthesis`]** — fails every call; used when no provider is configured.
//! - **[`OpenAISynthesis`]** — OpenAI-compatible `POST /v1/chat/completions`.
//! - **[`OllamaSynthesis`]** — local Ollama `POST /api/chat`.
//!
//! Use [`create_synthesis_oracle`] to pick one from config.
//!
//! # Retry Strategy
//!
//! Both HTTP providers retry transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, … (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use rag_harness_core::oracle::{CompletionRequest, SynthesisOracle};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SynthesisConfig;

/// Instantiate the synthesis oracle named by `synthesis.provider`.
pub fn create_synthesis_oracle(config: &SynthesisConfig) -> Result<Arc<dyn SynthesisOracle>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledSynthesis)),
        "openai" => Ok(Arc::new(OpenAISynthesis::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaSynthesis::new(config)?)),
        other => bail!("Unknown synthesis provider: {}", other),
    }
}

// ============ Disabled ============

/// A synthesis oracle that always fails with a descriptive message.
///
/// Search and cite keep working; summarize reports that synthesis is off.
pub struct DisabledSynthesis;

#[async_trait]
impl SynthesisOracle for DisabledSynthesis {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        bail!("synthesis provider is disabled. Set [synthesis] provider in config")
    }
}

// ============ OpenAI ============

/// Chat-completions provider for the OpenAI API (or any compatible server).
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAISynthesis {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAISynthesis {
    /// # Errors
    ///
    /// Returns an error if `model` is not set or `OPENAI_API_KEY` is missing.
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("synthesis.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base = config.url.as_deref().unwrap_or("https://api.openai.com");

        Ok(Self {
            client: http_client(config)?,
            model,
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            api_key,
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

#[async_trait]
impl SynthesisOracle for OpenAISynthesis {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages(request),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        let json = post_with_retry(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &body,
            &self.retry,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// Chat provider for a local Ollama instance (default `http://localhost:11434`).
pub struct OllamaSynthesis {
    client: reqwest::Client,
    model: String,
    url: String,
    retry: RetryPolicy,
}

impl OllamaSynthesis {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("synthesis.model required for Ollama provider"))?;
        let base = config.url.as_deref().unwrap_or("http://localhost:11434");

        Ok(Self {
            client: http_client(config)?,
            model,
            url: format!("{}/api/chat", base.trim_end_matches('/')),
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

#[async_trait]
impl SynthesisOracle for OllamaSynthesis {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages(request),
            "stream": false,
            "options": {
                "num_predict": request.max_tokens,
                "temperature": request.temperature,
            },
        });
        let json =
            post_with_retry(&self.client, &self.url, None, &body, &self.retry, "Ollama").await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

// ============ Shared HTTP ============

fn http_client(config: &SynthesisConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn messages(request: &CompletionRequest) -> Value {
    json!([
        { "role": "system", "content": request.system },
        { "role": "user", "content": request.user },
    ])
}

/// How often and how patiently to retry transient failures.
#[derive(Debug, Clone)]
struct RetryPolicy {
    max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    base_delay: Duration,
}

impl RetryPolicy {
    fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }
}

/// POST a JSON body with retry/backoff and return the parsed JSON response.
async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    retry: &RetryPolicy,
    provider: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = retry.delay(attempt);
            tracing::warn!(provider, attempt, ?delay, "retrying synthesis request");
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        if let Some(key) = bearer {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        provider,
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                bail!("{} API error {}: {}", provider, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "sys".to_string(),
            user: "usr".to_string(),
            max_tokens: 125,
            temperature: 0.3,
        }
    }

    #[tokio::test]
    async fn test_disabled_fails_with_message() {
        let err = DisabledSynthesis.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_factory() {
        let config = SynthesisConfig::default();
        let oracle = create_synthesis_oracle(&config).unwrap();
        assert_eq!(oracle.model_name(), "disabled");

        let config = SynthesisConfig {
            provider: "ollama".to_string(),
            model: Some("llama3".to_string()),
            ..Default::default()
        };
        let oracle = create_synthesis_oracle(&config).unwrap();
        assert_eq!(oracle.model_name(), "llama3");

        let config = SynthesisConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        assert!(create_synthesis_oracle(&config).is_err());
    }

    #[test]
    fn test_messages_are_role_structured() {
        let m = messages(&request());
        assert_eq!(m[0]["role"], "system");
        assert_eq!(m[0]["content"], "sys");
        assert_eq!(m[1]["role"], "user");
        assert_eq!(m[1]["content"], "usr");
    }

    #[test]
    fn test_parse_openai_response() {
        let json = json!({ "choices": [{ "message": { "role": "assistant", "content": "  Answer.\n" } }] });
        assert_eq!(parse_openai_response(&json).unwrap(), "Answer.");
        assert!(parse_openai_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = json!({ "message": { "role": "assistant", "content": "Local answer" }, "done": true });
        assert_eq!(parse_ollama_response(&json).unwrap(), "Local answer");
        assert!(parse_ollama_response(&json!({ "error": "model not found" })).is_err());
    }

    // ─── Retry behavior against a scripted local server ───────────────

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Script {
        statuses: Arc<Vec<u16>>,
        calls: Arc<AtomicUsize>,
    }

    /// Answers the n-th request with `statuses[n]` (repeating the last one).
    async fn scripted(State(script): State<Script>) -> (StatusCode, Json<Value>) {
        let n = script.calls.fetch_add(1, Ordering::SeqCst);
        let code = script.statuses[n.min(script.statuses.len() - 1)];
        let status = StatusCode::from_u16(code).unwrap();
        if status.is_success() {
            (status, Json(json!({ "message": { "content": "ok" } })))
        } else {
            (status, Json(json!({ "error": format!("status {}", code) })))
        }
    }

    async fn start_scripted(statuses: &[u16]) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let script = Script {
            statuses: Arc::new(statuses.to_vec()),
            calls: calls.clone(),
        };
        let app = Router::new()
            .route("/api/chat", post(scripted))
            .with_state(script);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/api/chat", addr), calls)
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(9), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_until_success() {
        let (url, calls) = start_scripted(&[429, 200]).await;
        let client = reqwest::Client::new();

        let json = post_with_retry(&client, &url, None, &json!({}), &fast_retry(3), "Ollama")
            .await
            .unwrap();
        assert_eq!(parse_ollama_response(&json).unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_fails_fast() {
        let (url, calls) = start_scripted(&[400, 200]).await;
        let client = reqwest::Client::new();

        let err = post_with_retry(&client, &url, None, &json!({}), &fast_retry(3), "Ollama")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Ollama API error 400"), "{}", err);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_give_up_after_max_retries() {
        let (url, calls) = start_scripted(&[503]).await;
        let client = reqwest::Client::new();

        let err = post_with_retry(&client, &url, Some("k"), &json!({}), &fast_retry(2), "OpenAI")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OpenAI API error 503"), "{}", err);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_network_errors_are_retried_then_reported() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/api/chat", port);
        let client = reqwest::Client::new();

        let started = std::time::Instant::now();
        let result =
            post_with_retry(&client, &url, None, &json!({}), &fast_retry(2), "Ollama").await;
        assert!(result.is_err());
        // Two backoff sleeps (1ms + 2ms) happened before giving up.
        assert!(started.elapsed() >= Duration::from_millis(3));
    }
}
