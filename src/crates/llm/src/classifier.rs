//! The binary classifier port.
//!
//! The labeling engine only ever talks to a [`BinaryClassifier`]: given a
//! text, a category name and that category's description it answers with a
//! [`Label`]. Anything model-specific (prompting, answer parsing) stays in the
//! adapter that implements the trait.

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Binary label attached to a record for one category.
///
/// Serialized as the integers `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    /// The text does not belong to the category (0).
    Negative,
    /// The text belongs to the category (1).
    Positive,
}

impl Label {
    /// Numeric form used in exports.
    pub fn as_u8(self) -> u8 {
        match self {
            Label::Negative => 0,
            Label::Positive => 1,
        }
    }

    pub fn is_positive(self) -> bool {
        self == Label::Positive
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Negative),
            1 => Ok(Label::Positive),
            other => Err(format!("label must be 0 or 1, got {}", other)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// One question put to the classifier.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRequest<'a> {
    /// Record text.
    pub text: &'a str,
    /// Category name.
    pub category: &'a str,
    /// Free-text description of the category, used to prompt the model.
    pub description: &'a str,
}

/// External collaborator that labels a text for one category.
///
/// Implementations must be safe to call from many tasks at once and must not
/// keep per-call state: the engine may retry or run calls concurrently.
#[async_trait]
pub trait BinaryClassifier: Send + Sync {
    /// Classify `request.text` against `request.category`.
    async fn classify(&self, request: &ClassificationRequest<'_>) -> Result<Label>;

    /// Short identifier for logs (e.g. "ollama:gemma2:9b").
    fn name(&self) -> String;
}

/// Build the yes/no prompt sent to a text-generating model.
pub fn build_prompt(request: &ClassificationRequest<'_>) -> String {
    format!(
        "Analyze the following review for the '{category}' category.\n\n\
         REVIEW: \"{text}\"\n\n\
         Answer only with 1 (yes) or 0 (no) for the '{category}' category.\n\n\
         CATEGORY DESCRIPTION:\n{description}",
        category = request.category,
        text = request.text,
        description = request.description.trim(),
    )
}

fn positive_answer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(1|evet|yes)\b").expect("valid regex"))
}

/// Turn a free-text model answer into a label.
///
/// A standalone `1`, `evet` or `yes` means positive, any other non-empty
/// answer negative. `None` for a blank answer.
pub fn parse_binary_answer(answer: &str) -> Option<Label> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    if positive_answer().is_match(answer) {
        Some(Label::Positive)
    } else {
        Some(Label::Negative)
    }
}
