//! `labeler run` command handler

use crate::catalog;
use crate::classify::ClassificationService;
use crate::cli::load_config;
use crate::cli::progress::ProgressReporter;
use crate::cli::prompt;
use crate::config::JobConfig;
use crate::engine::{EngineSettings, JobEngine, JobReport, JobStore, ResumeChoice};
use crate::error::{LabelerError, Result};
use crate::events::{EventSink, TerminationReason};
use crate::input;
use crate::models::{JobFingerprint, JobState, SamplingMode};
use crate::shutdown::ShutdownCoordinator;
use chrono::{Local, Utc};
use colored::Colorize;
use label_checkpoint::{JsonFileStore, LoadOutcome};
use llm::local::OllamaClassifier;
use llm::LlmError;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::task::JoinHandle;
use tooling::logging::format_duration;
use tracing::{info, warn};

/// Flags of `labeler run` that override configuration
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub categories: Vec<String>,
    pub mode: Option<SamplingMode>,
    pub target_positive: Option<usize>,
    pub target_negative: Option<usize>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<usize>,
    pub seed: Option<u64>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
    pub resume: bool,
    pub restart: bool,
    pub no_progress: bool,
    pub skip_health_check: bool,
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    name: String,
    #[tabled(rename = "Positive")]
    positive: String,
    #[tabled(rename = "Negative")]
    negative: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Apply CLI flags on top of loaded configuration
///
/// `--category` picks from the active categories, or from the default preset
/// when none are configured. Target flags apply to every category.
pub fn apply_options(config: &mut JobConfig, options: &RunOptions) -> Result<()> {
    if options.resume && options.restart {
        return Err(LabelerError::Config(
            "--resume and --restart are mutually exclusive".to_string(),
        ));
    }

    if let Some(name) = &options.preset {
        config.categories = catalog::preset(name)?;
    }
    if !options.categories.is_empty() {
        let pool = if config.categories.is_empty() {
            catalog::preset(catalog::PRESETS[0])?
        } else {
            config.categories.clone()
        };
        config.categories = catalog::select(&pool, &options.categories)?;
    }

    if let Some(positive) = options.target_positive {
        config.targets.positive = positive;
        config.categories.iter_mut().for_each(|c| c.target_positive = None);
    }
    if let Some(negative) = options.target_negative {
        config.targets.negative = negative;
        config.categories.iter_mut().for_each(|c| c.target_negative = None);
    }

    if let Some(mode) = options.mode {
        config.sampling.mode = mode;
    }
    if let Some(seed) = options.seed {
        config.sampling.seed = Some(seed);
    }
    if let Some(concurrency) = options.concurrency {
        config.execution.concurrency = concurrency;
    }
    if let Some(max_retries) = options.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(model) = &options.model {
        config.classifier.model = model.clone();
    }
    if let Some(output) = &options.output {
        config.output.path = Some(output.clone());
    }
    if let Some(checkpoint) = &options.checkpoint {
        config.checkpoint.path = Some(checkpoint.clone());
    }

    Ok(())
}

/// Wait for the progress task; a failure there never fails the job
async fn finish_progress(progress: JoinHandle<()>) {
    if let Err(e) = progress.await {
        warn!(error = %e, "Progress display task failed");
    }
}

/// Handle run command
pub async fn handle_run(options: RunOptions) -> Result<JobReport> {
    let mut config = load_config(options.config.as_deref()).await?;
    apply_options(&mut config, &options)?;
    config.validate()?;

    let records = input::read_records(&options.input, &config.input)?;
    let categories = config.resolved_categories();

    let classifier = OllamaClassifier::new(config.classifier.clone())?;
    if !options.skip_health_check && !classifier.check_health().await {
        return Err(LabelerError::Classifier(LlmError::ServiceUnavailable(format!(
            "no Ollama server at {}",
            config.classifier.base_url
        ))));
    }

    let service = Arc::new(ClassificationService::new(
        Arc::new(classifier),
        config.execution.cache_size,
        config.retry_policy(),
    ));
    let checkpoint_path = config.checkpoint_path();
    let store: Arc<JobStore> =
        Arc::new(JsonFileStore::<JobFingerprint, JobState>::new(&checkpoint_path));
    let settings = EngineSettings::from_config(&config, config.output_path(Local::now()));

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let shutdown = ShutdownCoordinator::new();
    let engine = JobEngine::new(records, categories.clone(), service, store, settings)
        .with_shutdown(shutdown.clone())
        .with_events(EventSink::new(tx));

    let choice = resume_choice(&engine, &options).await?;

    info!(checkpoint = %checkpoint_path.display(), ?choice, "Checkpoint policy");
    let signals = shutdown.install_signal_handlers();
    let progress =
        ProgressReporter::new(categories, config.sampling.mode, options.no_progress).spawn(rx);

    let outcome = engine.run(choice).await;
    drop(engine);
    finish_progress(progress).await;
    signals.abort();

    let report = outcome?;
    print_report(&report);
    Ok(report)
}

async fn resume_choice(engine: &JobEngine, options: &RunOptions) -> Result<ResumeChoice> {
    if options.restart {
        return Ok(ResumeChoice::Restart);
    }
    if options.resume {
        return Ok(ResumeChoice::Resume);
    }

    match engine.inspect_checkpoint().await {
        LoadOutcome::Compatible(checkpoint) => {
            let state = &checkpoint.state;
            println!("{}", "Checkpoint found".bold());
            println!("  Written: {} ago", format_age(checkpoint.age(Utc::now())));
            println!("  Processed: {}", state.processed.len());
            println!("  Recorded: {}", state.results.len());
            for (name, counts) in &state.counts {
                println!("  {}: +{} -{}", name, counts.positive, counts.negative);
            }

            if prompt::confirm("Resume?")? {
                Ok(ResumeChoice::Resume)
            } else {
                Ok(ResumeChoice::Restart)
            }
        }
        LoadOutcome::Incompatible(reason) | LoadOutcome::Unreadable(reason) => {
            println!(
                "{}",
                format!("Existing checkpoint cannot be resumed: {}", reason).yellow()
            );
            Ok(ResumeChoice::Restart)
        }
        LoadOutcome::Absent => Ok(ResumeChoice::Resume),
    }
}

fn format_age(age: chrono::Duration) -> String {
    format_duration(age.to_std().unwrap_or_default())
}

/// Print the final summary table
pub fn print_report(report: &JobReport) {
    let headline = format!(
        "Finished ({}) in {}",
        report.reason,
        format_duration(report.elapsed)
    );
    match report.reason {
        TerminationReason::Cancelled => println!("{}", headline.yellow().bold()),
        _ => println!("{}", headline.green().bold()),
    }

    let rows: Vec<CategoryRow> = report
        .categories
        .iter()
        .map(|c| CategoryRow {
            name: c.name.clone(),
            positive: format!("{}/{}", c.counts.positive, c.target_positive),
            negative: format!("{}/{}", c.counts.negative, c.target_negative),
            status: if c.met { "met".to_string() } else { "short".to_string() },
        })
        .collect();
    println!("{}", Table::new(rows));

    println!(
        "  Processed: {}/{} (recorded {}, skipped {})",
        report.processed, report.total_records, report.recorded, report.skipped
    );
    for (reason, count) in &report.skipped_by_reason {
        println!("    {}: {}", reason, count);
    }
    println!(
        "  Classifications: {} (fallbacks {}, cache hit ratio {:.0}%)",
        report.classifications,
        report.fallbacks,
        report.cache.hit_ratio() * 100.0
    );
    if report.fallbacks > 0 {
        println!(
            "{}",
            format!("  {} labels fell back to 0 after retries", report.fallbacks).yellow()
        );
    }
    println!("  Output: {}", report.output_path.display());
    if report.resumed {
        println!("  Resumed run {}", report.run_id);
    }

    let unmet = report.unmet_categories();
    if !unmet.is_empty() {
        println!(
            "{}",
            format!("  Quota not reached: {}", unmet.join(", ")).yellow()
        );
    }
}
