//! Quota controller
//!
//! Decides whether more records should be dispatched and what happens to a
//! classified record.
//!
//! Single-category exploration follows this table:
//!
//! | positive met | negative met | label 1      | label 0      |
//! |--------------|--------------|--------------|--------------|
//! | no           | no           | recorded     | recorded     |
//! | yes          | no           | disqualified | recorded     |
//! | no           | yes          | recorded     | disqualified |
//! | yes          | yes          | quota_met    | quota_met    |
//!
//! With several categories every record is recorded with all its labels and
//! each tally only grows while below target. Exhaustive mode records
//! everything and counts without caps.

use crate::models::{Category, LabelCounts, SamplingMode, SkipReason};
use llm::Label;
use std::collections::BTreeMap;

/// What to do with a classified record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Record it and add these labels to the tallies
    Record { increments: Vec<(String, Label)> },
    /// Mark it processed without recording
    Skip(SkipReason),
}

#[derive(Debug, Clone)]
pub struct QuotaController {
    categories: Vec<Category>,
    mode: SamplingMode,
}

impl QuotaController {
    pub fn new(categories: Vec<Category>, mode: SamplingMode) -> Self {
        Self { categories, mode }
    }

    fn counts(counts: &BTreeMap<String, LabelCounts>, name: &str) -> LabelCounts {
        counts.get(name).copied().unwrap_or_default()
    }

    /// Every category has reached both targets
    pub fn all_met(&self, counts: &BTreeMap<String, LabelCounts>) -> bool {
        self.categories
            .iter()
            .all(|c| c.is_met(&Self::counts(counts, &c.name)))
    }

    /// Whether the job may terminate early
    pub fn is_satisfied(&self, counts: &BTreeMap<String, LabelCounts>) -> bool {
        self.mode == SamplingMode::Exploration && self.all_met(counts)
    }

    /// Whether another record should be classified
    pub fn should_dispatch(&self, counts: &BTreeMap<String, LabelCounts>) -> bool {
        !self.is_satisfied(counts)
    }

    /// Categories short of at least one target
    pub fn unmet(&self, counts: &BTreeMap<String, LabelCounts>) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| !c.is_met(&Self::counts(counts, &c.name)))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Decide the fate of a record given its labels and the current tallies
    pub fn decide(
        &self,
        counts: &BTreeMap<String, LabelCounts>,
        labels: &BTreeMap<String, Label>,
    ) -> Verdict {
        if self.mode == SamplingMode::Exhaustive {
            return Verdict::Record {
                increments: self.labelled(labels).collect(),
            };
        }

        if let [category] = self.categories.as_slice() {
            if self.all_met(counts) {
                return Verdict::Skip(SkipReason::QuotaMet);
            }
            let current = Self::counts(counts, &category.name);
            let Some(&label) = labels.get(&category.name) else {
                return Verdict::Skip(SkipReason::Disqualified);
            };
            let still_needed = match label {
                Label::Positive => current.positive < category.target_positive,
                Label::Negative => current.negative < category.target_negative,
            };
            return if still_needed {
                Verdict::Record {
                    increments: vec![(category.name.clone(), label)],
                }
            } else {
                Verdict::Skip(SkipReason::Disqualified)
            };
        }

        // Recorded with every label whatever the quota state
        let increments = self
            .labelled(labels)
            .filter(|(name, label)| {
                let current = Self::counts(counts, name);
                self.categories
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| match label {
                        Label::Positive => current.positive < c.target_positive,
                        Label::Negative => current.negative < c.target_negative,
                    })
                    .unwrap_or(false)
            })
            .collect();
        Verdict::Record { increments }
    }

    fn labelled<'a>(
        &'a self,
        labels: &'a BTreeMap<String, Label>,
    ) -> impl Iterator<Item = (String, Label)> + 'a {
        self.categories
            .iter()
            .filter_map(move |c| labels.get(&c.name).map(|l| (c.name.clone(), *l)))
    }
}
