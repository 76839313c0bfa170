// Configuration management module
// This module handles TOML configuration for the Ollama connection and comparison runs

pub mod settings;


pub use settings::{ComparisonConfig, Config, ConfigError, OllamaConfig};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
