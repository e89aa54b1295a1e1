//! CLI tests against the in-memory retrieval provider.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rag"))
}

fn setup_test_env(synthesis: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("docs.json"),
        r#"[
  {"id": 1, "title": "Vector databases", "content": "Vector databases index embeddings for similarity search.", "tags": ["db", "ml"]},
  {"id": 2, "title": "Inverted indexes", "content": "Full-text engines rely on inverted indexes and BM25.", "tags": ["search"]},
  {"id": 3, "title": "Gardening", "content": "Tomatoes need sun and regular watering.", "tags": []}
]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[server]
bind = "127.0.0.1:7341"

[retrieval]
provider = "memory"
documents_path = "{}/docs.json"

[synthesis]
{}
"#,
        root.display(),
        synthesis
    );

    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RAG_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_search_prints_results_and_session() {
    let (_tmp, config) = setup_test_env(r#"provider = "disabled""#);

    let (stdout, stderr, ok) = run_rag(&config, &["search", "vector", "--session", "cli-1"]);
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("Session ID: cli-1"));
    assert!(stdout.contains("1. Vector databases"));
    assert!(!stdout.contains("Gardening"));
}

#[test]
fn test_search_without_matches() {
    let (_tmp, config) = setup_test_env(r#"provider = "disabled""#);

    let (stdout, _, ok) = run_rag(&config, &["search", "quantum"]);
    assert!(ok);
    assert!(stdout.contains("No results found for \"quantum\""));
}

#[test]
fn test_search_limit() {
    let (_tmp, config) = setup_test_env(r#"provider = "disabled""#);

    let (stdout, _, ok) = run_rag(&config, &["search", "indexes", "--limit", "1"]);
    assert!(ok);
    assert!(stdout.contains("1. "));
    assert!(!stdout.contains("\n2. "));
}

#[test]
fn test_ask_with_disabled_synthesis_fails() {
    let (_tmp, config) = setup_test_env(r#"provider = "disabled""#);

    let (_, stderr, ok) = run_rag(&config, &["ask", "What indexes embeddings?", "--query", "vector"]);
    assert!(!ok);
    assert!(stderr.contains("synthesis oracle failed"));
}

#[test]
fn test_tools_lists_builtins() {
    let (_tmp, config) = setup_test_env(r#"provider = "disabled""#);

    let (stdout, _, ok) = run_rag(&config, &["tools"]);
    assert!(ok);
    for name in ["search", "summarize", "cite"] {
        assert!(stdout.contains(&format!("{} — ", name)), "missing {}", name);
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config) = setup_test_env(r#"provider = "carrier-pigeon""#);

    let (_, stderr, ok) = run_rag(&config, &["search", "vector"]);
    assert!(!ok);
    assert!(stderr.contains("synthesis"));
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_rag(&tmp.path().join("absent.toml"), &["search", "x"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
