//! Job engine
//!
//! Drives a labeling job through `Initializing -> Running -> Terminating ->
//! Done`. Classification runs in spawned tasks (at most `concurrency` at a
//! time); their results come back to the engine task, which is the only place
//! [`JobState`] is mutated.

use crate::cache::CacheMetrics;
use crate::classify::{ClassificationService, RecordLabels};
use crate::config::JobConfig;
use crate::error::Result;
use crate::events::{EventSink, JobEvent, JobPhase, RecordOutcome, TerminationReason};
use crate::models::{
    Category, JobFingerprint, JobState, LabelCounts, LabelResult, Record, SamplingMode, SkipReason,
};
use crate::output;
use crate::quota::{QuotaController, Verdict};
use crate::sampling::{fresh_seed, traversal_order};
use crate::shutdown::ShutdownCoordinator;
use label_checkpoint::{load_compatible, Checkpoint, CheckpointStore, LoadOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Store type used by the engine
pub type JobStore = dyn CheckpointStore<JobFingerprint, JobState>;

/// What to do with a compatible checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    /// Continue from a compatible checkpoint if there is one
    Resume,
    /// Ignore any checkpoint; it is overwritten at the next save
    Restart,
}

/// Run parameters that do not affect the fingerprint (except `mode`)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub mode: SamplingMode,
    pub concurrency: usize,
    pub checkpoint_every: usize,
    /// Seed for a fresh run; a resumed run keeps its stored seed
    pub seed: Option<u64>,
    pub keep_checkpoint: bool,
    pub output_path: PathBuf,
}

impl EngineSettings {
    pub fn from_config(config: &JobConfig, output_path: PathBuf) -> Self {
        Self {
            mode: config.sampling.mode,
            concurrency: config.execution.concurrency.max(1),
            checkpoint_every: config.checkpoint.every.max(1),
            seed: config.sampling.seed,
            keep_checkpoint: config.checkpoint.keep,
            output_path,
        }
    }
}

/// Final counts of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub name: String,
    pub counts: LabelCounts,
    pub target_positive: usize,
    pub target_negative: usize,
    pub met: bool,
}

/// Summary returned when a job reaches `Done`
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub run_id: Uuid,
    pub reason: TerminationReason,
    pub resumed: bool,
    pub categories: Vec<CategoryReport>,
    pub total_records: usize,
    pub processed: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub skipped_by_reason: BTreeMap<SkipReason, usize>,
    pub classifications: usize,
    pub fallbacks: usize,
    pub cache: CacheMetrics,
    pub elapsed: Duration,
    pub output_path: PathBuf,
    pub results: Vec<LabelResult>,
}

impl JobReport {
    /// Categories that never reached both targets
    pub fn unmet_categories(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|c| !c.met)
            .map(|c| c.name.as_str())
            .collect()
    }
}

struct ActiveRun {
    run_id: Uuid,
    fingerprint: JobFingerprint,
    state: JobState,
    resumed: bool,
    since_checkpoint: usize,
}

/// Checkpointed, quota-bounded labeling job
pub struct JobEngine {
    records: Vec<Record>,
    categories: Arc<Vec<Category>>,
    service: Arc<ClassificationService>,
    store: Arc<JobStore>,
    settings: EngineSettings,
    shutdown: ShutdownCoordinator,
    events: EventSink,
}

impl JobEngine {
    /// Records are identified by their position in `records`
    pub fn new(
        records: Vec<Record>,
        categories: Vec<Category>,
        service: Arc<ClassificationService>,
        store: Arc<JobStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            records,
            categories: Arc::new(categories),
            service,
            store,
            settings,
            shutdown: ShutdownCoordinator::new(),
            events: EventSink::none(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    pub fn fingerprint(&self) -> JobFingerprint {
        JobFingerprint::new(self.settings.mode, self.records.len(), &self.categories)
    }

    /// Look at the stored checkpoint without starting the job
    pub async fn inspect_checkpoint(&self) -> LoadOutcome<JobFingerprint, JobState> {
        load_compatible(&*self.store, &self.fingerprint()).await
    }

    /// Run the job to completion, quota, or cancellation
    ///
    /// Only a failure to write the final output is fatal; checkpoint problems
    /// are logged and reported as events.
    pub async fn run(&self, choice: ResumeChoice) -> Result<JobReport> {
        let started = Instant::now();
        self.events.emit(JobEvent::phase_changed(JobPhase::Initializing));

        let mut run = self.initialize(choice).await;
        let quota = QuotaController::new(self.categories.to_vec(), self.settings.mode);
        let mut queue = traversal_order(
            self.settings.mode,
            self.records.len(),
            run.state.seed,
            &run.state.processed,
        );

        info!(
            run_id = %run.run_id,
            mode = %self.settings.mode,
            total = self.records.len(),
            already_processed = run.state.processed.len(),
            remaining = queue.len(),
            resumed = run.resumed,
            classifier = %self.service.classifier_name(),
            "Starting labeling job"
        );
        self.events.emit(JobEvent::started(
            self.records.len(),
            run.state.processed.len(),
            queue.len(),
            run.resumed,
        ));
        self.events.emit(JobEvent::phase_changed(JobPhase::Running));

        let mut in_flight: JoinSet<(usize, RecordLabels)> = JoinSet::new();

        let reason = loop {
            if self.shutdown.is_shutdown_requested() {
                in_flight.abort_all();
                while in_flight.join_next().await.is_some() {}
                break TerminationReason::Cancelled;
            }

            while in_flight.len() < self.settings.concurrency
                && quota.should_dispatch(&run.state.counts)
            {
                let Some(index) = queue.pop_front() else {
                    break;
                };
                let record = &self.records[index];
                if record.is_blank() {
                    debug!(index, "Blank record skipped");
                    run.state.skip(index, SkipReason::Blank);
                    self.after_processed(&mut run, index, RecordOutcome::Skipped {
                        reason: SkipReason::Blank,
                    })
                    .await;
                    continue;
                }

                let service = Arc::clone(&self.service);
                let categories = Arc::clone(&self.categories);
                let text = record.text.clone();
                in_flight.spawn(async move {
                    let labels = service.label_record(&text, &categories).await;
                    (index, labels)
                });
            }

            if in_flight.is_empty() {
                break if quota.is_satisfied(&run.state.counts) {
                    TerminationReason::QuotaMet
                } else {
                    TerminationReason::InputExhausted
                };
            }

            tokio::select! {
                biased;
                _ = self.shutdown.wait_for_shutdown() => {}
                joined = in_flight.join_next() => match joined {
                    Some(Ok((index, labels))) => self.apply(&mut run, &quota, index, labels).await,
                    Some(Err(e)) => {
                        error!(error = %e, "Classification task failed; record left unprocessed")
                    }
                    None => {}
                },
            }
        };

        self.events.emit(JobEvent::phase_changed(JobPhase::Terminating));
        info!(reason = %reason, processed = run.state.processed.len(), "Terminating");
        self.save_checkpoint(&run).await;

        output::write_results(&self.settings.output_path, &self.categories, &run.state.results)
            .await?;

        if reason != TerminationReason::Cancelled && !self.settings.keep_checkpoint {
            match self.store.clear().await {
                Ok(()) => debug!(location = %self.store.location(), "Checkpoint removed"),
                Err(e) => warn!(error = %e, "Failed to remove checkpoint"),
            }
        }

        self.events.emit(JobEvent::finished(reason));
        self.events.emit(JobEvent::phase_changed(JobPhase::Done));

        Ok(self.report(run, reason, started.elapsed()))
    }

    async fn initialize(&self, choice: ResumeChoice) -> ActiveRun {
        let fingerprint = self.fingerprint();

        if choice == ResumeChoice::Resume {
            match load_compatible(&*self.store, &fingerprint).await {
                LoadOutcome::Compatible(checkpoint) => {
                    info!(
                        run_id = %checkpoint.run_id,
                        processed = checkpoint.state.processed.len(),
                        written_at = %checkpoint.written_at,
                        "Resuming from checkpoint"
                    );
                    return ActiveRun {
                        run_id: checkpoint.run_id,
                        fingerprint,
                        state: checkpoint.state,
                        resumed: true,
                        since_checkpoint: 0,
                    };
                }
                LoadOutcome::Absent => debug!("No checkpoint, starting fresh"),
                LoadOutcome::Incompatible(reason) | LoadOutcome::Unreadable(reason) => {
                    warn!(reason = %reason, "Checkpoint not resumed, starting fresh");
                    self.events.emit(JobEvent::checkpoint_rejected(reason));
                }
            }
        }

        let seed = self.settings.seed.unwrap_or_else(fresh_seed);
        ActiveRun {
            run_id: Uuid::new_v4(),
            state: JobState::new(seed, &self.categories),
            fingerprint,
            resumed: false,
            since_checkpoint: 0,
        }
    }

    async fn apply(
        &self,
        run: &mut ActiveRun,
        quota: &QuotaController,
        index: usize,
        labels: RecordLabels,
    ) {
        run.state.classifications += labels.classifications;
        run.state.fallbacks += labels.fallbacks;

        let outcome = match quota.decide(&run.state.counts, &labels.labels) {
            Verdict::Record { increments } => {
                let record = &self.records[index];
                run.state.record(
                    LabelResult {
                        index,
                        date: record.date.clone(),
                        text: record.text.clone(),
                        labels: labels.labels,
                    },
                    &increments,
                );
                RecordOutcome::Recorded
            }
            Verdict::Skip(reason) => {
                run.state.skip(index, reason);
                RecordOutcome::Skipped { reason }
            }
        };
        debug!(index, ?outcome, cache_hits = labels.cache_hits, "Record processed");

        self.after_processed(run, index, outcome).await;
    }

    async fn after_processed(&self, run: &mut ActiveRun, index: usize, outcome: RecordOutcome) {
        self.events.emit(JobEvent::record_processed(
            index,
            outcome,
            run.state.processed.len(),
            run.state.counts.clone(),
        ));

        run.since_checkpoint += 1;
        if run.since_checkpoint >= self.settings.checkpoint_every {
            self.events.emit(JobEvent::phase_changed(JobPhase::Checkpointing));
            self.save_checkpoint(run).await;
            run.since_checkpoint = 0;
            self.events.emit(JobEvent::phase_changed(JobPhase::Running));
        }
    }

    async fn save_checkpoint(&self, run: &ActiveRun) {
        let checkpoint =
            Checkpoint::for_run(run.run_id, run.fingerprint.clone(), run.state.clone());
        let processed = run.state.processed.len();

        match self.store.save(&checkpoint).await {
            Ok(()) => {
                info!(processed, location = %self.store.location(), "Checkpoint saved");
                self.events.emit(JobEvent::checkpoint_saved(processed));
            }
            Err(e) => {
                warn!(error = %e, location = %self.store.location(), "Checkpoint save failed, continuing");
                self.events.emit(JobEvent::checkpoint_failed(e.to_string()));
            }
        }
    }

    fn report(&self, run: ActiveRun, reason: TerminationReason, elapsed: Duration) -> JobReport {
        let state = run.state;
        let categories = self
            .categories
            .iter()
            .map(|c| {
                let counts = state.counts_for(&c.name);
                CategoryReport {
                    name: c.name.clone(),
                    counts,
                    target_positive: c.target_positive,
                    target_negative: c.target_negative,
                    met: c.is_met(&counts),
                }
            })
            .collect();

        JobReport {
            run_id: run.run_id,
            reason,
            resumed: run.resumed,
            categories,
            total_records: self.records.len(),
            processed: state.processed.len(),
            recorded: state.results.len(),
            skipped: state.skipped.len(),
            skipped_by_reason: state.skipped_by_reason(),
            classifications: state.classifications,
            fallbacks: state.fallbacks,
            cache: self.service.cache_metrics(),
            elapsed,
            output_path: self.settings.output_path.clone(),
            results: state.results,
        }
    }
}
