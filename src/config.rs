//! TOML configuration for the `converse` server and CLI.
//!
//! Every section is optional: a missing file or a missing table falls back
//! to the defaults below, so `converse serve` works with nothing more than
//! `OPENAI_API_KEY` in the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::refusal::DEFAULT_NEGATION_PHRASES;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub refusal: RefusalConfig,
    #[serde(default)]
    pub references: ReferencesConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_bytes")]
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    /// Upper bound on live sessions; the least recently used goes first.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_bytes(),
            session_idle_secs: default_session_idle_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_max_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_session_idle_secs() -> u64 {
    60 * 60
}
fn default_max_sessions() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
        }
    }
}

fn default_min_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, or an OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("text-embedding-3-small".to_string())
}
fn default_dims() -> Option<usize> {
    Some(1536)
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_chat_model(),
            url: None,
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_chat_model() -> Option<String> {
    Some("gpt-3.5-turbo".to_string())
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefusalConfig {
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
}

impl Default for RefusalConfig {
    fn default() -> Self {
        Self {
            phrases: default_phrases(),
        }
    }
}

fn default_phrases() -> Vec<String> {
    DEFAULT_NEGATION_PHRASES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

/// How answer references point at cited pages.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// `/documents/{index}#page=P`, served by the web UI.
    #[default]
    Route,
    /// `data:application/pdf;base64,...#page=P`, self-contained.
    Inline,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReferencesConfig {
    #[serde(default)]
    pub link_style: LinkStyle,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub remote: RemoteSourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSourceConfig {
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for RemoteSourceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_remote_timeout_secs(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_remote_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Offline configuration: both providers disabled. Used by `converse
    /// extract` and by tests that never touch the network.
    pub fn minimal() -> Self {
        let mut config = Config::default();
        config.embedding.provider = "disabled".to_string();
        config.llm.provider = "disabled".to_string();
        config
    }
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.min_chars == 0 {
        anyhow::bail!("chunking.min_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.server.max_sessions == 0 {
        anyhow::bail!("server.max_sessions must be > 0");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    if config.refusal.phrases.iter().all(|p| p.trim().is_empty()) {
        anyhow::bail!("refusal.phrases must contain at least one non-empty phrase");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.min_chars, 1000);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.refusal.phrases.len(), 5);
        validate(&config).unwrap();
    }

    #[test]
    fn rejects_unknown_provider() {
        let config: Config = toml::from_str("[llm]\nprovider = \"bard\"\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn rejects_zero_min_chars() {
        let config: Config = toml::from_str("[chunking]\nmin_chars = 0\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn disabled_embedding_needs_no_dims() {
        let config: Config =
            toml::from_str("[embedding]\nprovider = \"disabled\"\ndims = 0\n").unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn remote_timeout_is_independent_of_llm() {
        let config: Config = toml::from_str("[llm]\ntimeout_secs = 5\n").unwrap();
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.sources.remote.timeout_secs, 60);

        let config: Config =
            toml::from_str("[sources.remote]\ntimeout_secs = 9\n").unwrap();
        assert_eq!(config.sources.remote.timeout_secs, 9);
    }

    #[test]
    fn session_limits_and_link_style() {
        let config: Config = toml::from_str(
            "[server]\nmax_sessions = 3\nsession_idle_secs = 10\n[references]\nlink_style = \"inline\"\n",
        )
        .unwrap();
        assert_eq!(config.server.max_sessions, 3);
        assert_eq!(config.server.session_idle_secs, 10);
        assert_eq!(config.references.link_style, LinkStyle::Inline);
        assert_eq!(Config::default().references.link_style, LinkStyle::Route);

        let config: Config = toml::from_str("[server]\nmax_sessions = 0\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8501");
    }
}
