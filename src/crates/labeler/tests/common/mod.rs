//! Common test utilities and setup

#![allow(dead_code)]

use async_trait::async_trait;
use label_checkpoint::InMemoryStore;
use labeler::{
    Category, ClassificationService, EngineSettings, JobEngine, JobFingerprint, JobState,
    LabelResult, Record, SamplingMode, ShutdownCoordinator,
};
use llm::{BinaryClassifier, ClassificationRequest, Label, LlmError, Result as LlmResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tooling::async_utils::retry::RetryPolicy;

pub type MemoryStore = InMemoryStore<JobFingerprint, JobState>;

/// Labels text containing "good" as positive and counts every call
#[derive(Default)]
pub struct KeywordClassifier {
    calls: AtomicUsize,
    per_question: Mutex<HashMap<(String, String), usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls made for one (text, category) question
    pub fn calls_for(&self, text: &str, category: &str) -> usize {
        self.per_question
            .lock()
            .get(&(text.to_string(), category.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn questions(&self) -> Vec<((String, String), usize)> {
        self.per_question
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn label_for(text: &str) -> Label {
        if text.contains("good") {
            Label::Positive
        } else {
            Label::Negative
        }
    }
}

#[async_trait]
impl BinaryClassifier for KeywordClassifier {
    async fn classify(&self, request: &ClassificationRequest<'_>) -> LlmResult<Label> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_question
            .lock()
            .entry((request.text.to_string(), request.category.to_string()))
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(Self::label_for(request.text))
    }

    fn name(&self) -> String {
        "keyword".to_string()
    }
}

/// Always fails with a retryable error
#[derive(Default)]
pub struct FailingClassifier {
    calls: AtomicUsize,
}

impl FailingClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BinaryClassifier for FailingClassifier {
    async fn classify(&self, _request: &ClassificationRequest<'_>) -> LlmResult<Label> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::ServiceUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> String {
        "failing".to_string()
    }
}

/// Answers like [`KeywordClassifier`] until call number `stop_at`, which
/// requests shutdown and never returns
pub struct InterruptingClassifier {
    inner: KeywordClassifier,
    stop_at: usize,
    shutdown: ShutdownCoordinator,
}

impl InterruptingClassifier {
    pub fn new(stop_at: usize, shutdown: ShutdownCoordinator) -> Self {
        Self {
            inner: KeywordClassifier::new(),
            stop_at,
            shutdown,
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl BinaryClassifier for InterruptingClassifier {
    async fn classify(&self, request: &ClassificationRequest<'_>) -> LlmResult<Label> {
        if self.inner.calls() + 1 >= self.stop_at {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            self.shutdown.request_shutdown();
            std::future::pending::<()>().await;
        }
        self.inner.classify(request).await
    }

    fn name(&self) -> String {
        "interrupting".to_string()
    }
}

pub fn records(texts: &[&str]) -> Vec<Record> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Record::new(i, Some(format!("2024-01-{:02}", i + 1)), *text))
        .collect()
}

/// Ten reviews, five containing "good"
pub fn ten_reviews() -> Vec<Record> {
    records(&[
        "good service",
        "late delivery",
        "good prices",
        "app crashes",
        "good support",
        "missing items",
        "good packaging",
        "rude courier",
        "good selection",
        "slow refund",
    ])
}

pub fn category(name: &str, positive: usize, negative: usize) -> Category {
    Category::new(name, format!("{} related feedback", name), positive, negative)
}

pub fn service(classifier: Arc<dyn BinaryClassifier>, cache_size: usize, attempts: usize) -> Arc<ClassificationService> {
    Arc::new(ClassificationService::new(
        classifier,
        cache_size,
        RetryPolicy::new(attempts).with_delay(Duration::from_millis(1)),
    ))
}

pub fn settings(dir: &Path, mode: SamplingMode, concurrency: usize, checkpoint_every: usize) -> EngineSettings {
    EngineSettings {
        mode,
        concurrency,
        checkpoint_every,
        seed: Some(42),
        keep_checkpoint: true,
        output_path: dir.join("labels.csv"),
    }
}

pub fn engine(
    records: Vec<Record>,
    categories: Vec<Category>,
    service: Arc<ClassificationService>,
    store: &MemoryStore,
    settings: EngineSettings,
) -> JobEngine {
    JobEngine::new(records, categories, service, Arc::new(store.clone()), settings)
}

/// Results keyed by index, for order-independent comparison
pub fn by_index(results: &[LabelResult]) -> Vec<LabelResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by_key(|r| r.index);
    sorted
}
