//! Progress bar driven by engine events

use crate::events::JobEvent;
use crate::models::{Category, LabelCounts, SamplingMode};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tooling::logging::{estimate_remaining, format_duration};

/// Renders [`JobEvent`]s onto an `indicatif` bar
pub struct ProgressReporter {
    bar: ProgressBar,
    categories: Vec<Category>,
    mode: SamplingMode,
    started: Option<(Instant, usize)>,
    /// First quota observation in exploration mode: when, and slots filled then
    quota_anchor: Option<(Instant, usize)>,
    total: usize,
}

impl ProgressReporter {
    pub fn new(categories: Vec<Category>, mode: SamplingMode, hidden: bool) -> Self {
        let bar = ProgressBar::new(0);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        let style = ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Self {
            bar,
            categories,
            mode,
            started: None,
            quota_anchor: None,
            total: 0,
        }
    }

    /// Consume events until the sender side is dropped
    pub fn spawn(mut self, mut rx: UnboundedReceiver<JobEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(&event);
            }
            self.bar.finish_and_clear();
        })
    }

    pub fn handle(&mut self, event: &JobEvent) {
        match event {
            JobEvent::Started {
                total_records,
                already_processed,
                ..
            } => {
                self.total = *total_records;
                self.started = Some((Instant::now(), *already_processed));
                self.bar.set_length(*total_records as u64);
                self.bar.set_position(*already_processed as u64);
                self.bar.println(event.description());
            }
            JobEvent::RecordProcessed {
                processed, counts, ..
            } => {
                self.bar.set_position(*processed as u64);
                if self.mode == SamplingMode::Exploration && self.quota_anchor.is_none() {
                    self.quota_anchor = Some((Instant::now(), self.quota_filled(counts)));
                }
                self.bar.set_message(self.message(*processed, counts));
            }
            JobEvent::CheckpointRejected { .. } => {
                self.bar.println(event.description().yellow().to_string());
            }
            JobEvent::CheckpointFailed { .. } => {
                self.bar.println(event.description().red().to_string());
            }
            JobEvent::Finished { .. } => {
                self.bar.println(event.description().green().to_string());
            }
            JobEvent::PhaseChanged { .. } | JobEvent::CheckpointSaved { .. } => {}
        }
    }

    /// Per-category counts against targets plus the remaining-time estimate
    pub fn message(&self, processed: usize, counts: &BTreeMap<String, LabelCounts>) -> String {
        let tallies: Vec<String> = self
            .categories
            .iter()
            .map(|c| {
                let n = counts.get(&c.name).copied().unwrap_or_default();
                format!(
                    "{} +{}/{} -{}/{}",
                    c.name, n.positive, c.target_positive, n.negative, c.target_negative
                )
            })
            .collect();

        match self.remaining(processed, counts) {
            Some(eta) => format!("{} | eta {}", tallies.join(", "), format_duration(eta)),
            None => tallies.join(", "),
        }
    }

    /// Exploration stops at the quotas, so it is paced by quota slots filled
    /// rather than records processed
    fn remaining(&self, processed: usize, counts: &BTreeMap<String, LabelCounts>) -> Option<Duration> {
        match self.mode {
            SamplingMode::Exploration => self.quota_anchor.and_then(|(at, baseline)| {
                let filled = self.quota_filled(counts).saturating_sub(baseline);
                estimate_remaining(at.elapsed(), filled, self.quota_slots().saturating_sub(baseline))
            }),
            SamplingMode::Exhaustive => self.started.and_then(|(at, baseline)| {
                let done = processed.saturating_sub(baseline);
                estimate_remaining(at.elapsed(), done, self.total.saturating_sub(baseline))
            }),
        }
    }

    fn quota_slots(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.target_positive + c.target_negative)
            .sum()
    }

    /// Counts capped at their targets, summed over categories
    fn quota_filled(&self, counts: &BTreeMap<String, LabelCounts>) -> usize {
        self.categories
            .iter()
            .map(|c| {
                let n = counts.get(&c.name).copied().unwrap_or_default();
                n.positive.min(c.target_positive) + n.negative.min(c.target_negative)
            })
            .sum()
    }
}
