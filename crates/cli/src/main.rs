//! litsearch CLI
//!
//! Main entry point for the litsearch command-line tool.
//! Builds the abstract index offline and answers top-k similarity queries.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, CleanCommand, QueryCommand, StatsCommand};
use litsearch_core::config::{AppConfig, ConfigOverrides};
use litsearch_core::{logging, AppResult};
use std::path::PathBuf;

/// litsearch - semantic search over biomedical abstracts
#[derive(Parser, Debug)]
#[command(name = "litsearch")]
#[command(about = "Semantic search over biomedical abstracts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./litsearch.yaml if present)
    #[arg(short, long, global = true, env = "LITSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of per-abstract JSON records
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Directory holding the index, id map and manifest
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Embedding checkpoint file
    #[arg(long, global = true)]
    checkpoint: Option<PathBuf>,

    /// Embedding provider (ollama, mock)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Embedding model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Embedding dimensionality
    #[arg(long, global = true)]
    dimensions: Option<usize>,

    /// Use the parallel search backend
    #[arg(long, global = true, conflicts_with = "no_accelerate")]
    accelerate: bool,

    /// Force sequential search
    #[arg(long, global = true)]
    no_accelerate: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let accelerate = match (self.accelerate, self.no_accelerate) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        ConfigOverrides {
            corpus_dir: self.corpus.clone(),
            index_dir: self.index.clone(),
            checkpoint_path: self.checkpoint.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            top_k: None,
            accelerate,
            log_level: self.log_level.clone(),
            verbose: self.verbose,
            no_color: self.no_color,
            log_json: self.log_json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed the corpus and write the index
    Build(BuildCommand),

    /// Retrieve the abstracts most similar to a query
    Query(QueryCommand),

    /// Show index statistics
    Stats(StatsCommand),

    /// Remove the index, id map, manifest and checkpoint
    Clean(CleanCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then config file, then environment, then flags
    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(cli.overrides());
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("litsearch starting");
    tracing::debug!("Corpus: {:?}", config.corpus_dir);
    tracing::debug!("Index: {:?}", config.index_dir);
    tracing::debug!(
        "Embedding: provider={}, model={}",
        config.embedding.provider,
        config.embedding.model
    );

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Query(_) => "query",
        Commands::Stats(_) => "stats",
        Commands::Clean(_) => "clean",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config),
        Commands::Clean(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
