
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::capability::DEFAULT_CAPABILITY_TIMEOUT_SECONDS;
use crate::retrieval::RetrievalMethod;

const APP_DIR_NAME: &str = "chunk-eval";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub batch_size: u32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            batch_size: 16,
            timeout_seconds: DEFAULT_CAPABILITY_TIMEOUT_SECONDS,
        }
    }
}

/// Parameters of a single naive-vs-semantic comparison run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Naive chunk size in tokens
    pub chunk_size_tokens: usize,
    /// Tokens shared by consecutive naive chunks
    pub overlap_tokens: usize,
    /// Cosine similarity below which a semantic chunk is closed
    pub similarity_threshold: f32,
    /// Minimum semantic chunk size before a split is allowed
    pub min_tokens: usize,
    /// Maximum semantic chunk size
    pub max_tokens: usize,
    pub retrieval_method: RetrievalMethod,
    pub top_k: usize,
    pub num_questions: usize,
    /// Questions evaluated concurrently per strategy
    pub concurrency: usize,
    pub capability_timeout_seconds: u64,
    /// Lexical share of the hybrid and hybrid-embedding scores
    pub hybrid_lexical_weight: f64,
    /// Embedding share of the hybrid-embedding score
    pub embedding_weight: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: 400,
            overlap_tokens: 50,
            similarity_threshold: 0.7,
            min_tokens: 75,
            max_tokens: 400,
            retrieval_method: RetrievalMethod::Hybrid,
            top_k: 3,
            num_questions: 8,
            concurrency: 4,
            capability_timeout_seconds: DEFAULT_CAPABILITY_TIMEOUT_SECONDS,
            hybrid_lexical_weight: 0.3,
            embedding_weight: 0.7,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid chunk size: {0} (must be between 1 and 8192 tokens)")]
    InvalidChunkSize(usize),
    #[error("Invalid similarity threshold: {0} (must be between -1.0 and 1.0)")]
    InvalidSimilarityThreshold(f32),
    #[error("Min tokens ({0}) must not exceed max tokens ({1})")]
    MinTokensExceedMax(usize, usize),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid question count: {0} (must be between 1 and 100)")]
    InvalidQuestionCount(usize),
    #[error("Invalid concurrency: {0} (must be between 1 and 64)")]
    InvalidConcurrency(usize),
    #[error("Invalid weight: {0} (must be between 0.0 and 1.0)")]
    InvalidWeight(f64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Platform configuration directory for this application
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.comparison.validate()?;
        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        for model in [&self.embedding_model, &self.generation_model] {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidModel(model.clone()));
            }
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl ComparisonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for size in [self.chunk_size_tokens, self.min_tokens, self.max_tokens] {
            if !(1..=8192).contains(&size) {
                return Err(ConfigError::InvalidChunkSize(size));
            }
        }

        if !self.similarity_threshold.is_finite() || !(-1.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(ConfigError::InvalidSimilarityThreshold(
                self.similarity_threshold,
            ));
        }

        if self.min_tokens > self.max_tokens {
            return Err(ConfigError::MinTokensExceedMax(
                self.min_tokens,
                self.max_tokens,
            ));
        }

        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if !(1..=100).contains(&self.num_questions) {
            return Err(ConfigError::InvalidQuestionCount(self.num_questions));
        }

        if !(1..=64).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }

        if !(1..=600).contains(&self.capability_timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.capability_timeout_seconds));
        }

        for weight in [self.hybrid_lexical_weight, self.embedding_weight] {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::InvalidWeight(weight));
            }
        }

        Ok(())
    }
}
