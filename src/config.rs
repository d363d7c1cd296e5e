//! Configuration parsing and validation.
//!
//! The service is configured via a TOML file (default: `config/scout.toml`).
//! The file is optional — every section has defaults — and a handful of
//! environment variables override it so the binary can run configured by
//! environment alone:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `STORE_URL` | `[store] url` |
//! | `DEFAULT_PROJECT` | `[search] default_project` |
//! | `LLM_API_KEY` | `[llm] api_key` (enables the LLM rewriter and compactor) |
//! | `LLM_MODEL_REWRITE` | `[llm] rewrite_model` |
//! | `LLM_MODEL_SUMMARISE` | `[llm] summarise_model` |
//! | `LLM_TIMEOUT_MS` | `[llm] timeout_ms` |
//!
//! Without an LLM API key the query rewriter runs its lexicon pass only and
//! the memory compactor emits deterministic summaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub context: ContextConfig,
    pub compaction: CompactionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Endpoint of the vector store.
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Project filter applied when a tool call omits one.
    pub default_project: String,
    pub default_limit: usize,
    /// Keyword/vector blend for basic search; `0` = keyword, `1` = vector.
    pub default_alpha: f64,
    /// Reflexion quality threshold for advanced search.
    pub threshold: f64,
    pub max_attempts: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_project: "general".to_string(),
            default_limit: 10,
            default_alpha: 0.5,
            threshold: 0.5,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions API base. The key itself comes from `LLM_API_KEY`
    /// (or this section) and its absence disables both LLM passes.
    pub api_base: String,
    pub api_key: Option<String>,
    pub rewrite_model: String,
    pub summarise_model: String,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            rewrite_model: "gpt-4o-mini".to_string(),
            summarise_model: "gpt-4o-mini".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    pub max_files: usize,
    /// Import-path alias map applied before dependency resolution,
    /// e.g. `"@/" = "src/"`.
    pub aliases: BTreeMap<String, String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert("@/".to_string(), "src/".to_string());
        Self {
            max_files: 10,
            aliases,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompactionConfig {
    pub older_than_days: i64,
    pub min_group_size: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            older_than_days: 30,
            min_group_size: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7400".to_string(),
        }
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist, then apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("STORE_URL") {
        if !v.trim().is_empty() {
            config.store.url = v;
        }
    }
    if let Ok(v) = std::env::var("DEFAULT_PROJECT") {
        if !v.trim().is_empty() {
            config.search.default_project = v;
        }
    }
    if let Ok(v) = std::env::var("LLM_API_KEY") {
        if !v.trim().is_empty() {
            config.llm.api_key = Some(v);
        }
    }
    if let Ok(v) = std::env::var("LLM_MODEL_REWRITE") {
        if !v.trim().is_empty() {
            config.llm.rewrite_model = v;
        }
    }
    if let Ok(v) = std::env::var("LLM_MODEL_SUMMARISE") {
        if !v.trim().is_empty() {
            config.llm.summarise_model = v;
        }
    }
    if let Ok(v) = std::env::var("LLM_TIMEOUT_MS") {
        if let Ok(ms) = v.trim().parse::<u64>() {
            config.llm.timeout_ms = ms;
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.store.url.trim().is_empty() {
        anyhow::bail!("store.url must not be empty");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.search.default_alpha) {
        anyhow::bail!("search.default_alpha must be in [0.0, 1.0]");
    }

    if !(0.0..=1.0).contains(&config.search.threshold) {
        anyhow::bail!("search.threshold must be in [0.0, 1.0]");
    }

    if config.search.max_attempts < 1 {
        anyhow::bail!("search.max_attempts must be >= 1");
    }

    if config.llm.timeout_ms == 0 {
        anyhow::bail!("llm.timeout_ms must be > 0");
    }

    if config.context.max_files == 0 {
        anyhow::bail!("context.max_files must be > 0");
    }

    if config.compaction.older_than_days < 0 {
        anyhow::bail!("compaction.older_than_days must be >= 0");
    }

    Ok(())
}
