//! Evaluator CLI - Score Content From the Command Line
//!
//! Thin front end over `evaluator-core`. Every command prints its result as
//! JSON on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate a request file
//! evaluator evaluate --request request.json
//!
//! # Quick, speed-biased evaluation
//! evaluator quick "New trail shoe grips wet rock" -d readability -d engagement
//!
//! # Thorough evaluation over the configured dimension set
//! evaluator comprehensive '{"title": "Q3 report", "body": "..."}'
//!
//! # Show seeded backend profiles
//! evaluator profiles
//!
//! # Offline run against the deterministic backend, verbose logging
//! RUST_LOG=debug evaluator --backend scripted quick "hello" -d seo
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use evaluator_core::{
    load_config, load_config_from_path, EvaluationRequest, Evaluator, EvaluatorConfig,
    OllamaScorer, ScoringBackend, ScriptedBackend,
};

/// Evaluator - adaptive multi-backend content scoring
#[derive(Parser, Debug)]
#[command(name = "evaluator")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "EVALUATOR_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Scoring backend to dispatch to
    #[arg(short = 'b', long, env = "EVALUATOR_BACKEND", value_enum, default_value_t = BackendChoice::Ollama, global = true)]
    backend: BackendChoice,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "EVALUATOR_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Print compact JSON instead of pretty-printed JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a JSON request file
    Evaluate {
        /// Path to an evaluation request (JSON)
        #[arg(short = 'r', long, value_name = "FILE")]
        request: PathBuf,
    },

    /// Fast evaluation with a small budget and a short deadline
    Quick {
        /// Content to score (JSON, or plain text)
        content: String,

        /// Dimension to score (repeatable)
        #[arg(short = 'd', long = "dimension", required = true)]
        dimensions: Vec<String>,
    },

    /// Thorough evaluation over the configured dimension set
    Comprehensive {
        /// Content to score (JSON, or plain text)
        content: String,
    },

    /// Print backend performance profiles
    Profiles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    /// Local Ollama server (OLLAMA_HOST / OLLAMA_PORT)
    Ollama,
    /// Deterministic in-memory replies
    Scripted,
}

impl BackendChoice {
    fn build(self) -> Arc<dyn ScoringBackend> {
        match self {
            Self::Ollama => Arc::new(OllamaScorer::from_env()),
            Self::Scripted => Arc::new(ScriptedBackend::new()),
        }
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("evaluator_cli={level},evaluator_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<PathBuf>) -> Result<EvaluatorConfig> {
    let config = match path {
        Some(path) => load_config_from_path(Some(path))?,
        None => load_config()?,
    };
    info!(
        source = ?config.source(),
        path = ?config.config_file_path,
        "Configuration loaded"
    );
    Ok(config)
}

/// JSON content if it parses, otherwise the raw text
fn parse_content(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn read_request(path: &Path) -> Result<EvaluationRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid request in {path:?}"))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    debug!(version = env!("CARGO_PKG_VERSION"), backend = ?args.backend, "Evaluator starting");

    let config = load(args.config)?;
    let evaluator = Evaluator::new(args.backend.build(), config);

    match args.command {
        Command::Evaluate { request } => {
            let request = read_request(&request)?;
            let result = evaluator.evaluate(&request).await?;
            print_json(&result, args.compact)?;
        }
        Command::Quick {
            content,
            dimensions,
        } => {
            let result = evaluator
                .quick_evaluate(parse_content(&content), dimensions)
                .await?;
            print_json(&result, args.compact)?;
        }
        Command::Comprehensive { content } => {
            let result = evaluator
                .comprehensive_evaluate(parse_content(&content))
                .await?;
            print_json(&result, args.compact)?;
        }
        Command::Profiles => {
            print_json(&evaluator.model_profiles(), args.compact)?;
        }
    }

    let stats = evaluator.cache_stats();
    debug!(
        evaluations = stats.total_evaluations,
        total_cost = stats.total_cost_spent,
        "Evaluator finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_content() {
        assert_eq!(
            parse_content(r#"{"title": "Hi"}"#),
            serde_json::json!({"title": "Hi"})
        );
        assert_eq!(parse_content("plain copy"), Value::String("plain copy".to_string()));
    }

    #[test]
    fn test_quick_requires_dimensions() {
        assert!(Args::try_parse_from(["evaluator", "quick", "text"]).is_err());

        let args =
            Args::try_parse_from(["evaluator", "--backend", "scripted", "quick", "text", "-d", "seo", "-d", "readability"])
                .unwrap();
        assert_eq!(args.backend, BackendChoice::Scripted);
        match args.command {
            Command::Quick { dimensions, .. } => assert_eq!(dimensions, vec!["seo", "readability"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_read_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"content": "copy", "dimensions": ["seo"], "constraints": {{"cost_budget": 0.05}}}}"#
        )
        .unwrap();

        let request = read_request(file.path()).unwrap();
        assert_eq!(request.dimensions, vec!["seo"]);
        assert_eq!(request.constraints.cost_budget, Some(0.05));
    }

    #[test]
    fn test_read_request_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(read_request(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_scripted_backend_end_to_end() {
        let evaluator = Evaluator::new(BackendChoice::Scripted.build(), EvaluatorConfig::new());
        let result = evaluator
            .quick_evaluate(parse_content("hello"), ["seo"])
            .await
            .unwrap();
        assert_eq!(result.dimension_scores.len(), 1);
        assert!(result.fallbacks_used.is_empty());
    }
}
