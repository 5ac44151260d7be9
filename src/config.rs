use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub fetcher: Option<FetcherConfig>,
}

/// Connection settings for the external vector index.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_host")]
    pub host: String,
    #[serde(default = "default_index_port")]
    pub port: u16,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Distance metric the collection is created with.
    #[serde(default = "default_distance")]
    pub distance: String,
    #[serde(default = "default_search_ef")]
    pub search_ef: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_host() -> String {
    "localhost".to_string()
}
fn default_index_port() -> u16 {
    6300
}
fn default_collection() -> String {
    "chat_messages".to_string()
}
fn default_distance() -> String {
    "cosine".to_string()
}
fn default_search_ef() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default)]
    pub overlap: usize,
    /// Length measure for the size bound: `"chars"` or `"tokens"`.
    #[serde(default = "default_measure")]
    pub measure: String,
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default)]
    pub force_paragraph_split: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            overlap: 0,
            measure: default_measure(),
            min_words: default_min_words(),
            force_paragraph_split: false,
        }
    }
}

fn default_max_size() -> usize {
    150
}
fn default_measure() -> String {
    "chars".to_string()
}
fn default_min_words() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Settings for the optional remote posts API used by `fetch`.
#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

    if config.chunking.max_size == 0 {
        return Err(Error::Config("chunking.max_size must be > 0".into()));
    }
    if config.chunking.overlap >= config.chunking.max_size {
        return Err(Error::Config(
            "chunking.overlap must be smaller than chunking.max_size".into(),
        ));
    }
    match config.chunking.measure.as_str() {
        "chars" | "tokens" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown chunking.measure: '{other}'. Must be chars or tokens."
            )))
        }
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            return Err(Error::Config(format!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            )));
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            return Err(Error::Config(format!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            )));
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown embedding provider: '{other}'. Must be disabled or openai."
            )))
        }
    }

    Ok(config)
}
