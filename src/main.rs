use std::path::PathBuf;

use chunk_eval::Result;
use chunk_eval::commands::{CompareOptions, init_config, run_chunk, run_compare, show_config};
use chunk_eval::retrieval::RetrievalMethod;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chunk-eval")]
#[command(about = "Compare naive and semantic document chunking by their effect on RAG quality")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate both chunking strategies on a document and recommend one
    Compare {
        /// Plain text or markdown document
        file: PathBuf,
        /// Write the full JSON report to this path
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Do not contact Ollama; score with heuristics only
        #[arg(long)]
        offline: bool,
        /// Retrieval method: lexical, tfidf, hybrid, embedding or hybrid-embedding
        #[arg(long)]
        method: Option<RetrievalMethod>,
        /// Number of test questions to generate
        #[arg(long)]
        questions: Option<usize>,
        /// Chunks retrieved per question
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Chunk a document with both strategies and show chunk statistics
    Chunk {
        file: PathBuf,
        #[arg(long)]
        offline: bool,
    },
    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write a default config.toml if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Compare {
            file,
            output,
            offline,
            method,
            questions,
            top_k,
        } => {
            let options = CompareOptions {
                output,
                offline,
                method,
                questions,
                top_k,
            };
            run_compare(config_dir, &file, options).await?;
        }
        Commands::Chunk { file, offline } => {
            run_chunk(config_dir, &file, offline).await?;
        }
        Commands::Config { show, init } => {
            if init {
                init_config(config_dir)?;
            }
            if show || !init {
                show_config(config_dir)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn compare_command_with_defaults() {
        let cli = Cli::try_parse_from(["chunk-eval", "compare", "doc.md"])
            .expect("compare should parse");

        let Commands::Compare {
            file,
            output,
            offline,
            method,
            questions,
            top_k,
        } = cli.command
        else {
            panic!("expected compare command");
        };
        assert_eq!(file, PathBuf::from("doc.md"));
        assert_eq!(output, None);
        assert!(!offline);
        assert_eq!(method, None);
        assert_eq!(questions, None);
        assert_eq!(top_k, None);
        assert_eq!(cli.config_dir, None);
    }

    #[test]
    fn compare_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "chunk-eval",
            "compare",
            "doc.md",
            "--output",
            "report.json",
            "--offline",
            "--method",
            "hybrid-embedding",
            "--questions",
            "12",
            "--top-k",
            "5",
            "--config-dir",
            "/tmp/chunk-eval",
        ])
        .expect("compare should parse");

        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/chunk-eval")));
        let Commands::Compare {
            output,
            offline,
            method,
            questions,
            top_k,
            ..
        } = cli.command
        else {
            panic!("expected compare command");
        };
        assert_eq!(output, Some(PathBuf::from("report.json")));
        assert!(offline);
        assert_eq!(method, Some(RetrievalMethod::HybridEmbedding));
        assert_eq!(questions, Some(12));
        assert_eq!(top_k, Some(5));
    }

    #[test]
    fn unknown_retrieval_method_is_rejected() {
        let cli = Cli::try_parse_from(["chunk-eval", "compare", "doc.md", "--method", "bm25"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn chunk_command() {
        let cli = Cli::try_parse_from(["chunk-eval", "chunk", "notes.txt", "--offline"])
            .expect("chunk should parse");

        let Commands::Chunk { file, offline } = cli.command else {
            panic!("expected chunk command");
        };
        assert_eq!(file, PathBuf::from("notes.txt"));
        assert!(offline);
    }

    #[test]
    fn config_flags() {
        let cli = Cli::try_parse_from(["chunk-eval", "config", "--show", "--init"])
            .expect("config should parse");

        let Commands::Config { show, init } = cli.command else {
            panic!("expected config command");
        };
        assert!(show);
        assert!(init);
    }

    #[test]
    fn compare_requires_a_file() {
        let cli = Cli::try_parse_from(["chunk-eval", "compare"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["chunk-eval", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["chunk-eval", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
