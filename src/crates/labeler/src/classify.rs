//! Classification service: cache, retry and fallback around the classifier
//!
//! Shared by every in-flight classification task through an `Arc`.

use crate::cache::{CacheKey, CacheMetrics, ResponseCache};
use crate::models::Category;
use llm::{BinaryClassifier, ClassificationRequest, Label, LlmError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tooling::async_utils::retry::{retry_with_fallback_when, RetryPolicy, RetryStatus};
use tracing::{debug, warn};

/// Label returned when every attempt fails
pub const FALLBACK_LABEL: Label = Label::Negative;

/// Where a label came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    Cache,
    Classifier { attempts: usize },
    Fallback { attempts: usize, last_error: String },
}

/// Labels for one record across all categories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordLabels {
    pub labels: BTreeMap<String, Label>,
    /// Labels computed (one per category)
    pub classifications: usize,
    pub fallbacks: usize,
    pub cache_hits: usize,
}

/// Wraps a [`BinaryClassifier`] with a response cache and retry policy.
pub struct ClassificationService {
    classifier: Arc<dyn BinaryClassifier>,
    cache: Mutex<ResponseCache>,
    retry: RetryPolicy,
}

impl ClassificationService {
    pub fn new(classifier: Arc<dyn BinaryClassifier>, cache_size: usize, retry: RetryPolicy) -> Self {
        Self {
            classifier,
            cache: Mutex::new(ResponseCache::new(cache_size)),
            retry,
        }
    }

    pub fn classifier_name(&self) -> String {
        self.classifier.name()
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.lock().metrics()
    }

    /// Label `text` for one category
    ///
    /// Never fails: exhausted retries yield [`FALLBACK_LABEL`], which is not
    /// cached.
    pub async fn label(&self, text: &str, category: &Category) -> (Label, LabelSource) {
        let key = CacheKey::new(text, &category.name);
        // Guard dropped before any await
        let cached = self.cache.lock().get(&key);
        if let Some(label) = cached {
            debug!(category = %category.name, %label, "Cache hit");
            return (label, LabelSource::Cache);
        }

        let request = ClassificationRequest {
            text,
            category: &category.name,
            description: &category.description,
        };
        let outcome = retry_with_fallback_when(
            &self.retry,
            || self.classifier.classify(&request),
            FALLBACK_LABEL,
            LlmError::is_retryable,
        )
        .await;

        match outcome.status {
            RetryStatus::Succeeded => {
                self.cache.lock().put(key, outcome.value);
                (
                    outcome.value,
                    LabelSource::Classifier {
                        attempts: outcome.attempts,
                    },
                )
            }
            RetryStatus::FellBack { last_error } => {
                warn!(
                    category = %category.name,
                    attempts = outcome.attempts,
                    error = %last_error,
                    "Classifier unavailable, using fallback label"
                );
                (
                    outcome.value,
                    LabelSource::Fallback {
                        attempts: outcome.attempts,
                        last_error,
                    },
                )
            }
        }
    }

    /// Label `text` for every category, one classifier question per category
    pub async fn label_record(&self, text: &str, categories: &[Category]) -> RecordLabels {
        let mut record = RecordLabels::default();
        for category in categories {
            let (label, source) = self.label(text, category).await;
            record.classifications += 1;
            match source {
                LabelSource::Cache => record.cache_hits += 1,
                LabelSource::Fallback { .. } => record.fallbacks += 1,
                LabelSource::Classifier { .. } => {}
            }
            record.labels.insert(category.name.clone(), label);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm::Result as LlmResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct KeywordClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BinaryClassifier for KeywordClassifier {
        async fn classify(&self, request: &ClassificationRequest<'_>) -> LlmResult<Label> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if request.text.contains("good") {
                Label::Positive
            } else {
                Label::Negative
            })
        }

        fn name(&self) -> String {
            "keyword".to_string()
        }
    }

    struct DownClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BinaryClassifier for DownClassifier {
        async fn classify(&self, _request: &ClassificationRequest<'_>) -> LlmResult<Label> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::ServiceUnavailable("connection refused".to_string()))
        }

        fn name(&self) -> String {
            "down".to_string()
        }
    }

    fn category(name: &str) -> Category {
        Category::new(name, "desc", 1, 1)
    }

    fn policy(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(attempts).with_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let classifier = Arc::new(KeywordClassifier {
            calls: AtomicUsize::new(0),
        });
        let service = ClassificationService::new(classifier.clone(), 16, policy(3));

        let (first, source) = service.label("good  app", &category("Ürün")).await;
        assert_eq!(first, Label::Positive);
        assert_eq!(source, LabelSource::Classifier { attempts: 1 });

        let (second, source) = service.label(" good app ", &category("Ürün")).await;
        assert_eq!(second, Label::Positive);
        assert_eq!(source, LabelSource::Cache);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_calls_every_time() {
        let classifier = Arc::new(KeywordClassifier {
            calls: AtomicUsize::new(0),
        });
        let service = ClassificationService::new(classifier.clone(), 0, policy(3));

        service.label("good", &category("Ürün")).await;
        service.label("good", &category("Ürün")).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_exact_attempts_and_not_cached() {
        let classifier = Arc::new(DownClassifier {
            calls: AtomicUsize::new(0),
        });
        let service = ClassificationService::new(classifier.clone(), 16, policy(3));

        let (label, source) = service.label("anything", &category("Stok")).await;
        assert_eq!(label, FALLBACK_LABEL);
        assert!(matches!(source, LabelSource::Fallback { attempts: 3, .. }));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);

        // Fallbacks are not memoized, so the next call retries again
        service.label("anything", &category("Stok")).await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 6);
        assert_eq!(service.cache_metrics().entries, 0);
    }

    struct MissingModelClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BinaryClassifier for MissingModelClassifier {
        async fn classify(&self, _request: &ClassificationRequest<'_>) -> LlmResult<Label> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::ModelNotFound("gemma3:27b".to_string()))
        }

        fn name(&self) -> String {
            "missing-model".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_falls_back_after_one_attempt() {
        let classifier = Arc::new(MissingModelClassifier {
            calls: AtomicUsize::new(0),
        });
        let service = ClassificationService::new(classifier.clone(), 16, policy(4));

        let (label, source) = service.label("anything", &category("Stok")).await;
        assert_eq!(label, FALLBACK_LABEL);
        match source {
            LabelSource::Fallback { attempts, last_error } => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("gemma3:27b"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_label_record_covers_every_category() {
        let classifier = Arc::new(KeywordClassifier {
            calls: AtomicUsize::new(0),
        });
        let service = ClassificationService::new(classifier, 16, policy(1));
        let categories = [category("Teslimat"), category("Stok")];

        let record = service.label_record("good delivery", &categories).await;
        assert_eq!(record.labels.len(), 2);
        assert_eq!(record.labels["Stok"], Label::Positive);
        assert_eq!(record.classifications, 2);
        assert_eq!(record.fallbacks, 0);
    }
}
