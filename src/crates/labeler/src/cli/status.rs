//! `labeler status` command handler

use crate::cli::load_config;
use crate::error::Result;
use crate::input;
use crate::models::{JobFingerprint, JobState};
use chrono::Utc;
use colored::Colorize;
use label_checkpoint::{CheckpointStore, JsonFileStore};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tooling::logging::format_duration;

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Category")]
    name: String,
    #[tabled(rename = "Positive")]
    positive: String,
    #[tabled(rename = "Negative")]
    negative: String,
}

/// Handle status command
///
/// With `input`, also reports whether the checkpoint matches the current
/// configuration and dataset.
pub async fn handle_status(
    config_path: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    input_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let path = checkpoint.unwrap_or_else(|| config.checkpoint_path());
    let store = JsonFileStore::<JobFingerprint, JobState>::new(&path);

    let Some(checkpoint) = store.load().await? else {
        println!("{}", format!("No checkpoint at {}", path.display()).yellow());
        return Ok(());
    };

    let state = &checkpoint.state;
    let age = checkpoint.age(Utc::now()).to_std().unwrap_or_default();

    println!("{}", "Checkpoint".bold().underline());
    println!("  Path: {}", path.display());
    println!("  Run: {}", checkpoint.run_id);
    println!("  Written: {} ({} ago)", checkpoint.written_at.to_rfc3339(), format_duration(age));
    println!("  Mode: {}", checkpoint.fingerprint.sampling_mode);
    println!("  Fingerprint: {}", checkpoint.fingerprint.digest());
    println!(
        "  Processed: {}/{} (recorded {}, skipped {})",
        state.processed.len(),
        checkpoint.fingerprint.input_records,
        state.results.len(),
        state.skipped.len()
    );
    for (reason, count) in state.skipped_by_reason() {
        println!("    {}: {}", reason, count);
    }
    println!(
        "  Classifications: {} (fallbacks {})",
        state.classifications, state.fallbacks
    );

    let rows: Vec<CountRow> = checkpoint
        .fingerprint
        .categories
        .iter()
        .map(|c| {
            let counts = state.counts_for(&c.name);
            CountRow {
                name: c.name.clone(),
                positive: format!("{}/{}", counts.positive, c.target_positive),
                negative: format!("{}/{}", counts.negative, c.target_negative),
            }
        })
        .collect();
    println!("{}", Table::new(rows));

    if let Some(input_path) = input_path {
        let records = input::read_records(&input_path, &config.input)?;
        let current = JobFingerprint::new(
            config.sampling.mode,
            records.len(),
            &config.resolved_categories(),
        );
        if current == checkpoint.fingerprint {
            println!("{}", "✓ Matches current configuration".green());
        } else {
            println!(
                "{}",
                format!(
                    "✗ Does not match current configuration (current {})",
                    current.digest()
                )
                .red()
            );
        }
    }

    Ok(())
}
