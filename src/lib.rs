use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod capability;
pub mod chunking;
pub mod commands;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod questions;
pub mod retrieval;
pub mod stats;

pub use pipeline::{ComparisonReport, Document, compare, compare_document};
