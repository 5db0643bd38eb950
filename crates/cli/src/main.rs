//! Trainer Insight CLI
//!
//! Main entry point for the `insight` command-line tool: builds the
//! feedback index and answers questions over it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ClearCommand, FiltersCommand, IndexCommand, StatusCommand};
use insight_core::logging::{self, LogFormat};
use insight_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Trainer Insight - ask questions about trainer feedback
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(about = "Retrieval-augmented answers over trainer feedback", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "INSIGHT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.insight/config.yaml)
    #[arg(short, long, global = true, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Embedding provider (huggingface, hashing)
    #[arg(long, global = true, env = "INSIGHT_EMBEDDING_PROVIDER")]
    embedding_provider: Option<String>,

    /// Generator model identifier
    #[arg(short, long, global = true, env = "INSIGHT_GENERATOR_MODEL")]
    model: Option<String>,

    /// Index backend (lancedb, memory)
    #[arg(long, global = true, env = "INSIGHT_INDEX_BACKEND")]
    index_backend: Option<String>,

    /// Record export to read feedback from
    #[arg(long, global = true, env = "INSIGHT_RECORDS")]
    records: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the feedback index from the record export
    Index(IndexCommand),

    /// Ask a question about trainer feedback
    Ask(AskCommand),

    /// Show index and service status
    Status(StatusCommand),

    /// Empty the feedback index
    Clear(ClearCommand),

    /// Show the filters extracted from a query
    Filters(FiltersCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file, environment, then flags
    let mut config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        cli.embedding_provider,
        cli.model,
        cli.index_backend,
        cli.records,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.log_json |= cli.log_json;

    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    config.validate()?;

    tracing::info!("Trainer Insight CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding: {}/{}",
        config.embedding.provider,
        config.embedding.model
    );
    tracing::debug!("Generator: {}", config.generator.model);

    config.ensure_insight_dir()?;

    let command_name = match &cli.command {
        Commands::Index(_) => "index",
        Commands::Ask(_) => "ask",
        Commands::Status(_) => "status",
        Commands::Clear(_) => "clear",
        Commands::Filters(_) => "filters",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Clear(cmd) => cmd.execute(&config).await,
        Commands::Filters(cmd) => cmd.execute(),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
