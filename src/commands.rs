use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
mod tests;

use crate::capability::{Capabilities, OllamaClient};
use crate::chunking::{ChunkQuality, assess_quality, chunk_naive, chunk_semantic};
use crate::config::{Config, get_config_dir};
use crate::metrics::Metric;
use crate::pipeline::{ComparisonReport, Document, compare_document};
use crate::retrieval::RetrievalMethod;
use crate::stats::ComparisonMode;

/// Overrides for a single `compare` invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareOptions {
    pub output: Option<PathBuf>,
    pub offline: bool,
    pub method: Option<RetrievalMethod>,
    pub questions: Option<usize>,
    pub top_k: Option<usize>,
}

/// Load the configuration from `config_dir`, or from the platform directory
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_config_dir()?,
    };
    Config::load(&dir).with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

/// Read a document from disk, using the file stem as its title
#[inline]
pub fn read_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    let mut document = Document::new(text);
    if let Some(stem) = path.file_stem() {
        document = document.with_title(stem.to_string_lossy());
    }
    if let Some(mime_type) = mime_type_for(path) {
        document = document.with_mime_type(mime_type);
    }
    Ok(document)
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "md" | "markdown" => Some("text/markdown"),
        "txt" | "text" => Some("text/plain"),
        "rst" => Some("text/x-rst"),
        _ => None,
    }
}

/// Attach the Ollama client when it is enabled and reachable; otherwise run on heuristics
#[inline]
pub async fn build_capabilities(config: &Config, offline: bool) -> Capabilities {
    let capabilities = Capabilities::none()
        .with_timeout(Duration::from_secs(
            config.comparison.capability_timeout_seconds,
        ))
        .with_embed_batch_size(config.ollama.batch_size as usize);

    if offline || !config.ollama.enabled {
        info!("Running without model capabilities");
        return capabilities;
    }

    let client = match OllamaClient::new(&config.ollama) {
        Ok(client) => client,
        Err(e) => {
            warn!("Could not create Ollama client: {:#}", e);
            return capabilities;
        }
    };

    let checker = client.clone();
    match tokio::task::spawn_blocking(move || checker.health_check()).await {
        Ok(Ok(())) => {
            let client = Arc::new(client);
            capabilities
                .with_embedder(Arc::clone(&client) as Arc<dyn crate::capability::Embedder>)
                .with_generator(client)
        }
        Ok(Err(e)) => {
            warn!(
                "Ollama is unavailable, continuing with heuristic scoring: {:#}",
                e
            );
            capabilities
        }
        Err(e) => {
            warn!("Ollama health check did not complete: {}", e);
            capabilities
        }
    }
}

/// Run a full naive vs semantic comparison on `file`
#[inline]
pub async fn run_compare(config_dir: Option<&Path>, file: &Path, options: CompareOptions) -> Result<()> {
    let config = load_config(config_dir)?;
    let mut comparison = config.comparison.clone();
    if let Some(method) = options.method {
        comparison.retrieval_method = method;
    }
    if let Some(questions) = options.questions {
        comparison.num_questions = questions;
    }
    if let Some(top_k) = options.top_k {
        comparison.top_k = top_k;
    }

    let document = read_document(file)?;
    let capabilities = build_capabilities(&config, options.offline).await;

    let bar = spinner(&format!("Comparing chunking strategies on {}", file.display()));
    let result = compare_document(&document, &comparison, &capabilities).await;
    bar.finish_and_clear();
    let report = result?;

    print_report(&report);

    if let Some(output) = options.output {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize comparison report")?;
        fs::write(&output, json)
            .with_context(|| format!("Failed to write report: {}", output.display()))?;
        println!();
        println!("Report written to {}", style(output.display()).cyan());
    }

    Ok(())
}

/// Chunk `file` with both strategies and print size and coherence statistics
#[inline]
pub async fn run_chunk(config_dir: Option<&Path>, file: &Path, offline: bool) -> Result<()> {
    let config = load_config(config_dir)?;
    let comparison = &config.comparison;
    let document = read_document(file)?;
    let capabilities = build_capabilities(&config, offline).await;

    let naive = chunk_naive(
        &document.text,
        comparison.chunk_size_tokens,
        comparison.overlap_tokens,
    );
    let semantic = chunk_semantic(
        &document.text,
        comparison.similarity_threshold,
        comparison.min_tokens,
        comparison.max_tokens,
        &capabilities,
    )
    .await;

    let (naive_quality, semantic_quality) = tokio::join!(
        assess_quality(&naive, &capabilities),
        assess_quality(&semantic.chunks, &capabilities)
    );

    println!("{}", style(format!("Chunking {}", file.display())).bold().cyan());
    println!();
    print_quality("Naive", &naive_quality);
    print_quality("Semantic", &semantic_quality);
    if !semantic.used_similarity {
        println!();
        println!(
            "{}",
            style("Sentence embeddings unavailable: semantic chunks use size bounds only")
                .yellow()
        );
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;

    println!("{}", style("Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama Settings:").bold().yellow());
    println!("  Enabled: {}", style(config.ollama.enabled).cyan());
    match config.ollama.ollama_url() {
        Ok(url) => println!("  URL: {}", style(url).cyan()),
        Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
    }
    println!(
        "  Embedding model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    println!(
        "  Generation model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    println!("  Batch size: {}", style(config.ollama.batch_size).cyan());
    println!("  Timeout: {}s", style(config.ollama.timeout_seconds).cyan());

    let comparison = &config.comparison;
    println!();
    println!("{}", style("Comparison Settings:").bold().yellow());
    println!(
        "  Naive chunks: {} tokens, {} overlap",
        style(comparison.chunk_size_tokens).cyan(),
        style(comparison.overlap_tokens).cyan()
    );
    println!(
        "  Semantic chunks: {}-{} tokens, threshold {}",
        style(comparison.min_tokens).cyan(),
        style(comparison.max_tokens).cyan(),
        style(comparison.similarity_threshold).cyan()
    );
    println!(
        "  Retrieval: {} (top {})",
        style(comparison.retrieval_method).cyan(),
        style(comparison.top_k).cyan()
    );
    println!(
        "  Questions: {} ({} concurrent)",
        style(comparison.num_questions).cyan(),
        style(comparison.concurrency).cyan()
    );

    println!();
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Write a default `config.toml` unless one already exists
#[inline]
pub fn init_config(config_dir: Option<&Path>) -> Result<PathBuf> {
    let config = load_config(config_dir)?;
    let path = config.config_file_path();

    if path.exists() {
        println!(
            "{} {}",
            style("Configuration already exists:").yellow(),
            style(path.display()).cyan()
        );
        return Ok(path);
    }

    config.save()?;
    println!(
        "{} {}",
        style("✓ Configuration written to").green(),
        style(path.display()).cyan()
    );
    Ok(path)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").expect("style template is valid"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_quality(label: &str, quality: &ChunkQuality) {
    println!("{}", style(format!("{} chunking:", label)).bold().yellow());
    println!("  Chunks: {}", style(quality.total_chunks).cyan());
    println!(
        "  Average length: {} tokens (std {})",
        style(format!("{:.1}", quality.avg_chunk_length)).cyan(),
        style(format!("{:.1}", quality.length_std)).cyan()
    );
    println!(
        "  Coherence: {} ({:?})",
        style(format!("{:.3}", quality.coherence_score)).cyan(),
        quality.coherence_method
    );
}

fn print_report(report: &ComparisonReport) {
    let summary = &report.statistics.summary;

    println!("{}", style("Chunking Strategy Comparison").bold().cyan());
    if let Some(title) = &report.document.title {
        println!("Document: {}", style(title).cyan());
    }
    println!(
        "Questions: {}   Capabilities: {}{}",
        report.questions.len(),
        report.capability_mode,
        if report.simulated {
            style(" (simulated scores)").yellow().to_string()
        } else {
            String::new()
        }
    );
    println!();

    print_quality("Naive", &report.naive.quality);
    print_quality("Semantic", &report.semantic.quality);
    println!();

    println!(
        "{:<20} {:>8} {:>9} {:>9} {:>9}",
        "Metric", "Naive", "Semantic", "Change", "p-value"
    );
    for metric in Metric::ALL {
        let Some(comparison) = report.statistics.metric(metric) else {
            continue;
        };
        let marker = if comparison.significant { "*" } else { "" };
        println!(
            "{:<20} {:>8.3} {:>9.3} {:>8.1}% {:>9}{}",
            metric.name(),
            comparison.baseline_mean,
            comparison.candidate_mean,
            comparison.improvement_percent,
            format_p_value(comparison.p_value),
            marker
        );
    }
    println!(
        "{:<20} {:>8.3} {:>9.3}",
        "overall", report.naive.overall_score, report.semantic.overall_score
    );
    println!();

    let recommendation = if summary.overall_improvement > 0.0 {
        style(&summary.recommendation_text).green()
    } else {
        style(&summary.recommendation_text).yellow()
    };
    println!("{}", recommendation);
    println!(
        "Confidence: {}   Significant metrics: {}/{}",
        style(summary.confidence_level).cyan(),
        summary.significant_count,
        summary.total_metrics
    );
    if report.statistics.mode == ComparisonMode::PointEstimate {
        println!(
            "{}",
            style("Only one question was evaluated; no significance testing was done").yellow()
        );
    }
}

/// `n/a` for undefined p-values, scientific notation below 0.001
#[inline]
pub fn format_p_value(p_value: Option<f64>) -> String {
    match p_value {
        None => "n/a".to_string(),
        Some(p) if p < 0.001 => format!("{:.1e}", p),
        Some(p) => format!("{:.3}", p),
    }
}
