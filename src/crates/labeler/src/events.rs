//! Job progress events
//!
//! The engine emits [`JobEvent`]s on an unbounded channel. The CLI turns them
//! into a progress bar; tests use them to observe phase transitions.

use crate::models::{LabelCounts, SkipReason};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle phase of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Initializing,
    Running,
    Checkpointing,
    Terminating,
    Done,
}

/// Why a job stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Every category reached its targets
    QuotaMet,
    /// No records left to visit
    InputExhausted,
    /// Shutdown was requested
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::QuotaMet => write!(f, "quota met"),
            TerminationReason::InputExhausted => write!(f, "input exhausted"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What happened to a processed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOutcome {
    Recorded,
    Skipped { reason: SkipReason },
}

/// Event types for job tracking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Phase transition
    PhaseChanged { phase: JobPhase, timestamp: i64 },
    /// A stored checkpoint was not resumed
    CheckpointRejected { reason: String, timestamp: i64 },
    /// Traversal is about to start
    Started {
        total_records: usize,
        already_processed: usize,
        remaining: usize,
        resumed: bool,
        timestamp: i64,
    },
    /// A record left the queue for good
    RecordProcessed {
        index: usize,
        outcome: RecordOutcome,
        processed: usize,
        counts: BTreeMap<String, LabelCounts>,
        timestamp: i64,
    },
    /// Checkpoint written
    CheckpointSaved { processed: usize, timestamp: i64 },
    /// Checkpoint write failed; the job continues
    CheckpointFailed { error: String, timestamp: i64 },
    /// Job finished
    Finished {
        reason: TerminationReason,
        timestamp: i64,
    },
}

impl JobEvent {
    pub fn phase_changed(phase: JobPhase) -> Self {
        JobEvent::PhaseChanged {
            phase,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn checkpoint_rejected(reason: impl Into<String>) -> Self {
        JobEvent::CheckpointRejected {
            reason: reason.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn started(total_records: usize, already_processed: usize, remaining: usize, resumed: bool) -> Self {
        JobEvent::Started {
            total_records,
            already_processed,
            remaining,
            resumed,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn record_processed(
        index: usize,
        outcome: RecordOutcome,
        processed: usize,
        counts: BTreeMap<String, LabelCounts>,
    ) -> Self {
        JobEvent::RecordProcessed {
            index,
            outcome,
            processed,
            counts,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn checkpoint_saved(processed: usize) -> Self {
        JobEvent::CheckpointSaved {
            processed,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn checkpoint_failed(error: impl Into<String>) -> Self {
        JobEvent::CheckpointFailed {
            error: error.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn finished(reason: TerminationReason) -> Self {
        JobEvent::Finished {
            reason,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Human-readable one-liner
    pub fn description(&self) -> String {
        match self {
            JobEvent::PhaseChanged { phase, .. } => format!("Phase: {:?}", phase),
            JobEvent::CheckpointRejected { reason, .. } => {
                format!("Checkpoint not resumed: {}", reason)
            }
            JobEvent::Started {
                total_records,
                already_processed,
                resumed,
                ..
            } => {
                if *resumed {
                    format!(
                        "Resumed: {}/{} records already processed",
                        already_processed, total_records
                    )
                } else {
                    format!("Started: {} records", total_records)
                }
            }
            JobEvent::RecordProcessed { index, outcome, .. } => match outcome {
                RecordOutcome::Recorded => format!("Record {} recorded", index),
                RecordOutcome::Skipped { reason } => format!("Record {} skipped ({})", index, reason),
            },
            JobEvent::CheckpointSaved { processed, .. } => {
                format!("Checkpoint saved ({} processed)", processed)
            }
            JobEvent::CheckpointFailed { error, .. } => format!("Checkpoint failed: {}", error),
            JobEvent::Finished { reason, .. } => format!("Finished: {}", reason),
        }
    }
}

/// Optional event channel
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<JobEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that drops every event
    pub fn none() -> Self {
        Self { tx: None }
    }

    /// Send an event; a closed receiver is ignored
    pub fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
