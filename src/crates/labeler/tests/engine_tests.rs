//! Integration tests for the labeling job engine

mod common;

use common::*;
use label_checkpoint::Checkpoint;
use labeler::{
    EventSink, JobEvent, JobFingerprint, JobPhase, JobState, LabelCounts, LabelResult,
    ResumeChoice, SamplingMode, ShutdownCoordinator, SkipReason, TerminationReason,
};
use llm::Label;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn collect_events(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_ten_record_quota_scenario() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(KeywordClassifier::new());
    let store = MemoryStore::new();
    let engine = engine(
        ten_reviews(),
        vec![category("Service", 2, 2)],
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 5),
    );

    let report = engine.run(ResumeChoice::Resume).await.unwrap();

    assert_eq!(report.reason, TerminationReason::QuotaMet);
    assert!(classifier.calls() <= 10);
    assert_eq!(report.recorded, 4);
    assert!((4..=10).contains(&report.processed));
    assert_eq!(
        report.categories[0].counts,
        LabelCounts {
            positive: 2,
            negative: 2
        }
    );
    assert!(report.unmet_categories().is_empty());
    assert_eq!(report.processed, report.recorded + report.skipped);

    for result in &report.results {
        let text = &result.text;
        assert_eq!(result.labels["Service"], KeywordClassifier::label_for(text));
    }
}

#[tokio::test]
async fn test_resume_after_interruption_reproduces_results() {
    let dir = TempDir::new().unwrap();
    let categories = vec![category("Service", 2, 2)];

    // Uninterrupted reference run
    let reference_store = MemoryStore::new();
    let reference = engine(
        ten_reviews(),
        categories.clone(),
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &reference_store,
        settings(dir.path(), SamplingMode::Exploration, 1, 1),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    // Interrupted while classifying the third record
    let store = MemoryStore::new();
    let shutdown = ShutdownCoordinator::new();
    let interrupting = Arc::new(InterruptingClassifier::new(3, shutdown.clone()));
    let first = engine(
        ten_reviews(),
        categories.clone(),
        service(interrupting.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 1),
    )
    .with_shutdown(shutdown)
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(first.reason, TerminationReason::Cancelled);
    assert_eq!(first.processed, 2);
    let saved = store.snapshot().unwrap();
    assert_eq!(saved.state.processed.len(), 2);

    // Resume with a fresh classifier
    let classifier = Arc::new(KeywordClassifier::new());
    let resumed = engine(
        ten_reviews(),
        categories,
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 1),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert!(resumed.resumed);
    assert_eq!(resumed.run_id, first.run_id);
    assert_eq!(by_index(&resumed.results), by_index(&reference.results));
    assert_eq!(resumed.results.len(), 4);

    // Records finished before the interruption are never asked again
    let records = ten_reviews();
    for index in &saved.state.processed {
        assert_eq!(classifier.calls_for(&records[*index].text, "Service"), 0);
    }
}

#[tokio::test]
async fn test_resume_of_finished_job_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let categories = vec![category("Service", 2, 2)];

    let first = engine(
        ten_reviews(),
        categories.clone(),
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    let classifier = Arc::new(KeywordClassifier::new());
    let second = engine(
        ten_reviews(),
        categories,
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(classifier.calls(), 0);
    assert_eq!(second.reason, TerminationReason::QuotaMet);
    assert_eq!(second.results, first.results);
}

#[tokio::test]
async fn test_no_double_classification_across_categories() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(KeywordClassifier::slow(Duration::from_millis(2)));
    let store = MemoryStore::new();
    let texts = ["good a", "b", "good c", "d", "e", "good f", "g", "h"];

    let report = engine(
        records(&texts),
        vec![category("Price", 1, 1), category("Delivery", 1, 1)],
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 3, 2),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(report.recorded, texts.len());
    assert_eq!(classifier.calls(), texts.len() * 2);
    for ((text, category), calls) in classifier.questions() {
        assert_eq!(calls, 1, "{} / {} asked {} times", text, category, calls);
    }
    assert_eq!(report.classifications, texts.len() * 2);
}

#[tokio::test]
async fn test_multi_category_exploration_keeps_every_classified_record() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(KeywordClassifier::slow(Duration::from_millis(2)));
    let store = MemoryStore::new();
    let texts = ["good a", "b", "good c", "d", "good e", "f", "good g", "h"];

    let report = engine(
        records(&texts),
        vec![category("Price", 1, 1), category("Delivery", 1, 1)],
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 4, 100),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(report.reason, TerminationReason::QuotaMet);
    assert!(classifier.max_in_flight() >= 2);
    assert!(report.unmet_categories().is_empty());

    // Late finishers are recorded, never dropped as quota_met
    assert_eq!(report.skipped, 0);
    assert_eq!(report.recorded, report.processed);
    assert_eq!(report.results.len(), report.recorded);
    assert_eq!(classifier.calls(), report.recorded * 2);

    let mut seen: Vec<usize> = report.results.iter().map(|r| r.index).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), report.results.len());

    for result in &report.results {
        let expected = KeywordClassifier::label_for(&result.text);
        assert_eq!(result.labels.len(), 2);
        assert_eq!(result.labels["Price"], expected);
        assert_eq!(result.labels["Delivery"], expected);
    }

    for category in &report.categories {
        assert_eq!(
            category.counts,
            LabelCounts {
                positive: 1,
                negative: 1
            },
            "{} over its target",
            category.name
        );
        assert!(category.counts.positive + category.counts.negative <= report.results.len());
    }
}

#[tokio::test]
async fn test_identical_texts_hit_the_cache() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(KeywordClassifier::new());
    let store = MemoryStore::new();

    let report = engine(
        records(&["good app", "  good   app ", "bad app"]),
        vec![category("Price", 5, 5)],
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(classifier.calls(), 2);
    assert_eq!(report.cache.hits, 1);
    assert_eq!(report.classifications, 3);
    assert_eq!(report.results[1].labels["Price"], Label::Positive);
}

#[tokio::test]
async fn test_exhaustive_labels_every_non_blank_record() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let texts = ["good one", "", "two", "   ", "good three", "four"];

    let report = engine(
        records(&texts),
        vec![category("Price", 1, 1)],
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(report.reason, TerminationReason::InputExhausted);
    assert_eq!(report.recorded, 4);
    assert_eq!(report.processed, texts.len());
    assert_eq!(report.skipped_by_reason.get(&SkipReason::Blank), Some(&2));

    // Input order with one task in flight; counts are uncapped
    let indices: Vec<usize> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 2, 4, 5]);
    assert_eq!(
        report.categories[0].counts,
        LabelCounts {
            positive: 2,
            negative: 2
        }
    );
}

#[tokio::test]
async fn test_failing_classifier_falls_back_deterministically() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(FailingClassifier::default());
    let store = MemoryStore::new();

    let report = engine(
        records(&["a", "b", "c", "d"]),
        vec![category("Price", 10, 10)],
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 2, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(classifier.calls(), 4 * 3);
    assert_eq!(report.fallbacks, 4);
    assert_eq!(report.recorded, 4);
    assert!(report
        .results
        .iter()
        .all(|r| r.labels["Price"] == Label::Negative));
    assert_eq!(report.cache.entries, 0);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(KeywordClassifier::slow(Duration::from_millis(20)));
    let store = MemoryStore::new();
    let texts: Vec<String> = (0..12).map(|i| format!("review {}", i)).collect();
    let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

    let report = engine(
        records(&texts),
        vec![category("Price", 1, 1)],
        service(classifier.clone(), 0, 1),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 3, 100),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(report.recorded, 12);
    assert!(classifier.max_in_flight() <= 3);
    assert!(classifier.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_cancellation_checkpoints_and_writes_output() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let shutdown = ShutdownCoordinator::new();
    let classifier = Arc::new(InterruptingClassifier::new(1, shutdown.clone()));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = engine(
        ten_reviews(),
        vec![category("Service", 2, 2)],
        service(classifier, 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 2, 5),
    )
    .with_shutdown(shutdown)
    .with_events(EventSink::new(tx))
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(report.reason, TerminationReason::Cancelled);
    assert_eq!(report.processed, 0);

    let saved = store.snapshot().unwrap();
    assert!(saved.state.processed.is_empty());

    let output = std::fs::read_to_string(dir.path().join("labels.csv")).unwrap();
    assert_eq!(output.trim(), "index,date,text,Service");

    let events = collect_events(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        JobEvent::Finished {
            reason: TerminationReason::Cancelled,
            ..
        }
    )));
}

#[tokio::test]
async fn test_checkpoint_cadence() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();

    engine(
        records(&["a", "b", "c", "d", "e"]),
        vec![category("Price", 1, 1)],
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 2),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    // After 2 and 4 records, then the final save
    assert_eq!(store.save_count(), 3);
    assert_eq!(store.snapshot().unwrap().state.processed.len(), 5);
}

#[tokio::test]
async fn test_checkpoint_save_failures_do_not_abort() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.set_fail_saves(true);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = engine(
        records(&["good a", "b", "c"]),
        vec![category("Price", 1, 1)],
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 1),
    )
    .with_events(EventSink::new(tx))
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert_eq!(report.recorded, 3);
    assert!(store.snapshot().is_none());
    assert!(dir.path().join("labels.csv").exists());

    let failures = collect_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, JobEvent::CheckpointFailed { .. }))
        .count();
    assert_eq!(failures, 4);
}

#[tokio::test]
async fn test_mismatched_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let records = ten_reviews();
    let other = JobFingerprint::new(
        SamplingMode::Exploration,
        records.len(),
        &[category("Service", 3, 3)],
    );
    let mut stale = JobState::new(7, &[category("Service", 3, 3)]);
    stale.skip(0, SkipReason::Blank);
    let store = MemoryStore::with_checkpoint(Checkpoint::new(other, stale));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = engine(
        records,
        vec![category("Service", 2, 2)],
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 5),
    )
    .with_events(EventSink::new(tx))
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert!(!report.resumed);
    assert_eq!(report.recorded, 4);
    let events = collect_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, JobEvent::CheckpointRejected { .. })));

    // The stale checkpoint was replaced
    let saved = store.snapshot().unwrap();
    assert_eq!(saved.fingerprint.categories[0].target_positive, 2);
}

#[tokio::test]
async fn test_corrupt_checkpoint_state_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let records = ten_reviews();
    let categories = vec![category("Service", 2, 2)];
    let fingerprint = JobFingerprint::new(SamplingMode::Exploration, records.len(), &categories);

    let mut corrupt = JobState::new(42, &categories);
    corrupt.processed.push(3);
    let store = MemoryStore::with_checkpoint(Checkpoint::new(fingerprint, corrupt));

    let report = engine(
        records,
        categories,
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exploration, 1, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert!(!report.resumed);
    assert_eq!(report.reason, TerminationReason::QuotaMet);
}

#[tokio::test]
async fn test_restart_ignores_compatible_checkpoint() {
    let dir = TempDir::new().unwrap();
    let records = records(&["good a", "b", "c"]);
    let categories = vec![category("Price", 5, 5)];
    let fingerprint = JobFingerprint::new(SamplingMode::Exhaustive, records.len(), &categories);

    let mut state = JobState::new(1, &categories);
    state.record(
        LabelResult {
            index: 0,
            date: None,
            text: "good a".to_string(),
            labels: BTreeMap::from([("Price".to_string(), Label::Positive)]),
        },
        &[("Price".to_string(), Label::Positive)],
    );
    let store = MemoryStore::with_checkpoint(Checkpoint::new(fingerprint, state));

    let classifier = Arc::new(KeywordClassifier::new());
    let restarted = engine(
        records.clone(),
        categories.clone(),
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 5),
    )
    .run(ResumeChoice::Restart)
    .await
    .unwrap();

    assert!(!restarted.resumed);
    assert_eq!(classifier.calls(), 3);
    assert_eq!(restarted.processed, 3);
}

#[tokio::test]
async fn test_resume_skips_processed_records() {
    let dir = TempDir::new().unwrap();
    let records = records(&["good a", "b", "c"]);
    let categories = vec![category("Price", 5, 5)];
    let fingerprint = JobFingerprint::new(SamplingMode::Exhaustive, records.len(), &categories);

    let mut state = JobState::new(1, &categories);
    state.record(
        LabelResult {
            index: 0,
            date: None,
            text: "good a".to_string(),
            labels: BTreeMap::from([("Price".to_string(), Label::Positive)]),
        },
        &[("Price".to_string(), Label::Positive)],
    );
    let store = MemoryStore::with_checkpoint(Checkpoint::new(fingerprint, state));

    let classifier = Arc::new(KeywordClassifier::new());
    let report = engine(
        records,
        categories,
        service(classifier.clone(), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 5),
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert!(report.resumed);
    assert_eq!(classifier.calls(), 2);
    assert_eq!(classifier.calls_for("good a", "Price"), 0);
    assert_eq!(report.recorded, 3);
}

#[tokio::test]
async fn test_completed_job_removes_checkpoint_when_not_kept() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let mut settings = settings(dir.path(), SamplingMode::Exhaustive, 1, 1);
    settings.keep_checkpoint = false;

    engine(
        records(&["a", "b"]),
        vec![category("Price", 1, 1)],
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings,
    )
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    assert!(store.snapshot().is_none());
}

#[tokio::test]
async fn test_phase_sequence() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    engine(
        records(&["a"]),
        vec![category("Price", 1, 1)],
        service(Arc::new(KeywordClassifier::new()), 100, 3),
        &store,
        settings(dir.path(), SamplingMode::Exhaustive, 1, 5),
    )
    .with_events(EventSink::new(tx))
    .run(ResumeChoice::Resume)
    .await
    .unwrap();

    let phases: Vec<JobPhase> = collect_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            JobEvent::PhaseChanged { phase, .. } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            JobPhase::Initializing,
            JobPhase::Running,
            JobPhase::Terminating,
            JobPhase::Done
        ]
    );
}
