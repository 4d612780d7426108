//! Keyword heuristics over respondent turns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lower-case substring -> concern label.
pub const CONCERN_KEYWORDS: &[(&str, &str)] = &[
    ("chemo", "chemotherapy"),
    ("hair", "hair loss"),
    ("side effect", "side effects"),
    ("trial", "clinical trial"),
    ("test", "genomic testing"),
    ("come back", "recurrence"),
    ("work", "work impact"),
    ("cost", "cost"),
    ("scared", "fear"),
];

/// Labels whose keyword appears anywhere in `text` (case-insensitive).
pub fn detect_concerns(text: &str) -> BTreeSet<&'static str> {
    let lowered = text.to_lowercase();
    CONCERN_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, label)| *label)
        .collect()
}

pub fn contains_question(text: &str) -> bool {
    text.contains('?')
}

/// Concerns accumulated over a session, kept sorted for stable hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcernSet {
    labels: BTreeSet<String>,
}

impl ConcernSet {
    pub fn absorb(&mut self, text: &str) {
        self.labels
            .extend(detect_concerns(text).into_iter().map(String::from));
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}
