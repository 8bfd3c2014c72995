//! Domain types for labeling jobs

use label_checkpoint::ValidateState;
use llm::Label;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// One input text item.
///
/// `index` is the 0-based position of the data row in the input and the only
/// identity used for bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub index: usize,
    pub date: Option<String>,
    pub text: String,
}

impl Record {
    pub fn new(index: usize, date: Option<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            date,
            text: text.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A labeling target with its quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub description: String,
    pub target_positive: usize,
    pub target_negative: usize,
}

impl Category {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        target_positive: usize,
        target_negative: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            target_positive,
            target_negative,
        }
    }

    /// Whether `counts` satisfies both targets
    pub fn is_met(&self, counts: &LabelCounts) -> bool {
        counts.positive >= self.target_positive && counts.negative >= self.target_negative
    }
}

/// Record traversal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Seeded random order, stops once every quota is met
    #[default]
    Exploration,
    /// Input order, labels every record
    Exhaustive,
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingMode::Exploration => write!(f, "exploration"),
            SamplingMode::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

impl FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exploration" => Ok(SamplingMode::Exploration),
            "exhaustive" => Ok(SamplingMode::Exhaustive),
            other => Err(format!(
                "unknown sampling mode '{}' (expected exploration or exhaustive)",
                other
            )),
        }
    }
}

/// Positive and negative tallies for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub positive: usize,
    pub negative: usize,
}

impl LabelCounts {
    pub fn add(&mut self, label: Label) {
        match label {
            Label::Positive => self.positive += 1,
            Label::Negative => self.negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative
    }
}

/// Labels recorded for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelResult {
    pub index: usize,
    pub date: Option<String>,
    pub text: String,
    pub labels: BTreeMap<String, Label>,
}

/// Why a processed record was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Missing or whitespace-only text
    Blank,
    /// Classified while only the opposite label was still needed
    Disqualified,
    /// Finished after every quota was already met
    QuotaMet,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blank => write!(f, "blank"),
            SkipReason::Disqualified => write!(f, "disqualified"),
            SkipReason::QuotaMet => write!(f, "quota_met"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: SkipReason,
}

/// Mutable progress of a job, persisted in checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    /// Shuffle seed for exploration order
    pub seed: u64,
    /// Per-category tallies, never decreasing
    pub counts: BTreeMap<String, LabelCounts>,
    /// Handled indices in handling order
    pub processed: Vec<usize>,
    pub results: Vec<LabelResult>,
    pub skipped: Vec<SkippedRecord>,
    /// Labels computed (cache hits included)
    pub classifications: usize,
    /// Labels that fell back after retry exhaustion
    pub fallbacks: usize,
}

impl JobState {
    /// Fresh state with zero counts for every category
    pub fn new(seed: u64, categories: &[Category]) -> Self {
        Self {
            seed,
            counts: categories
                .iter()
                .map(|c| (c.name.clone(), LabelCounts::default()))
                .collect(),
            processed: Vec::new(),
            results: Vec::new(),
            skipped: Vec::new(),
            classifications: 0,
            fallbacks: 0,
        }
    }

    pub fn counts_for(&self, category: &str) -> LabelCounts {
        self.counts.get(category).copied().unwrap_or_default()
    }

    /// Append a result and bump the given category tallies
    pub fn record(&mut self, result: LabelResult, increments: &[(String, Label)]) {
        for (category, label) in increments {
            self.counts.entry(category.clone()).or_default().add(*label);
        }
        self.processed.push(result.index);
        self.results.push(result);
    }

    pub fn skip(&mut self, index: usize, reason: SkipReason) {
        self.processed.push(index);
        self.skipped.push(SkippedRecord { index, reason });
    }

    pub fn skipped_by_reason(&self) -> BTreeMap<SkipReason, usize> {
        let mut by_reason = BTreeMap::new();
        for skipped in &self.skipped {
            *by_reason.entry(skipped.reason).or_insert(0) += 1;
        }
        by_reason
    }
}

impl ValidateState for JobState {
    fn validate(&self) -> Result<(), String> {
        let mut processed = HashSet::with_capacity(self.processed.len());
        for index in &self.processed {
            if !processed.insert(*index) {
                return Err(format!("index {} processed twice", index));
            }
        }

        let mut handled = HashSet::with_capacity(self.processed.len());
        for result in &self.results {
            if !handled.insert(result.index) {
                return Err(format!("index {} recorded twice", result.index));
            }
        }
        for skipped in &self.skipped {
            if !handled.insert(skipped.index) {
                return Err(format!("index {} both recorded and skipped", skipped.index));
            }
        }

        if handled != processed {
            return Err(format!(
                "{} processed indices but {} recorded or skipped",
                processed.len(),
                handled.len()
            ));
        }

        let single = self.counts.len() == 1;
        for (category, counts) in &self.counts {
            if counts.total() > self.results.len() {
                return Err(format!(
                    "category '{}' counts {} labels for {} results",
                    category,
                    counts.total(),
                    self.results.len()
                ));
            }
            if single && counts.total() != self.results.len() {
                return Err(format!(
                    "category '{}' counts {} labels for {} results",
                    category,
                    counts.total(),
                    self.results.len()
                ));
            }
        }

        Ok(())
    }
}

/// Identity of the configuration a checkpoint belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFingerprint {
    pub sampling_mode: SamplingMode,
    pub input_records: usize,
    pub categories: Vec<Category>,
}

impl JobFingerprint {
    pub fn new(sampling_mode: SamplingMode, input_records: usize, categories: &[Category]) -> Self {
        Self {
            sampling_mode,
            input_records,
            categories: categories.to_vec(),
        }
    }

    /// Short stable hash for display
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let hash = Sha256::digest(&bytes);
        format!("{:x}", hash).chars().take(12).collect()
    }
}
