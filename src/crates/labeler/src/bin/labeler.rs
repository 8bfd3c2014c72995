//! Labeler CLI - checkpointed, quota-bounded LLM labeling
//!
//! Main entry point for the labeler command-line tool.

use clap::{Args, Parser, Subcommand};
use labeler::cli::{self, RunOptions};
use labeler::{SamplingMode, TerminationReason};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labeler")]
#[command(about = "Label CSV text records with a local LLM, one category at a time", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Debug logging (RUST_LOG wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Explicit config file (TOML, or YAML by extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or resume a labeling job
    Run(RunArgs),

    /// Show the stored checkpoint
    Status {
        /// Checkpoint file (defaults to the configured location)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Input CSV to check the checkpoint against
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// List built-in category presets
    Categories {
        /// Preset name
        #[arg(short, long, default_value = "market-app")]
        preset: String,
        /// Show full descriptions
        #[arg(long)]
        full: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input CSV file
    input: PathBuf,

    /// Use a built-in category preset
    #[arg(short, long)]
    preset: Option<String>,

    /// Label only these categories (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Traversal mode: exploration or exhaustive
    #[arg(short, long)]
    mode: Option<SamplingMode>,

    /// Positive examples wanted per category
    #[arg(long)]
    target_positive: Option<usize>,

    /// Negative examples wanted per category
    #[arg(long)]
    target_negative: Option<usize>,

    /// Maximum in-flight classifications
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Classifier attempts per record and category
    #[arg(long)]
    max_retries: Option<usize>,

    /// Shuffle seed for a fresh exploration run
    #[arg(long)]
    seed: Option<u64>,

    /// Ollama model name
    #[arg(long)]
    model: Option<String>,

    /// Output CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Checkpoint file path
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Resume a compatible checkpoint without asking
    #[arg(long, conflicts_with = "restart")]
    resume: bool,

    /// Ignore any checkpoint without asking
    #[arg(long)]
    restart: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Start even if the classifier does not answer a health probe
    #[arg(long)]
    skip_health_check: bool,
}

impl RunArgs {
    fn into_options(self, config: Option<PathBuf>) -> RunOptions {
        RunOptions {
            input: self.input,
            config,
            preset: self.preset,
            categories: self.categories,
            mode: self.mode,
            target_positive: self.target_positive,
            target_negative: self.target_negative,
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            seed: self.seed,
            model: self.model,
            output: self.output,
            checkpoint: self.checkpoint,
            resume: self.resume,
            restart: self.restart,
            no_progress: self.no_progress,
            skip_health_check: self.skip_health_check,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tooling::logging::init_logging(cli.verbose)?;

    match cli.command {
        Commands::Run(args) => {
            let report = cli::run::handle_run(args.into_options(cli.config)).await?;
            if report.reason == TerminationReason::Cancelled {
                // 130 = interrupted
                std::process::exit(130);
            }
        }
        Commands::Status { checkpoint, input } => {
            cli::status::handle_status(cli.config, checkpoint, input).await?;
        }
        Commands::Categories { preset, full } => {
            cli::categories::handle_categories(&preset, full)?;
        }
    }

    Ok(())
}
