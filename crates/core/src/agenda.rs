//! Lead Agenda Tracking
//!
//! The lead works through a fixed, ordered list of discourse topics. The
//! tracker records which topics are done, which one is active and how many
//! lead/respondent exchanges have happened on it, so the orchestrator can
//! force a move to the next topic regardless of what is being said.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Exchanges allowed on one topic before a transition is forced.
pub const MAX_TOPIC_EXCHANGES: u32 = 2;

/// One fixed discourse stage. Declaration order is agenda order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Introduction,
    Recommendation,
    Considerations,
    Closing,
}

impl Topic {
    pub const ORDER: [Topic; 4] = [
        Topic::Introduction,
        Topic::Recommendation,
        Topic::Considerations,
        Topic::Closing,
    ];

    /// Human-facing name used in coaching hints.
    pub fn label(self) -> &'static str {
        match self {
            Topic::Introduction => "introduction & results",
            Topic::Recommendation => "treatment recommendation",
            Topic::Considerations => "practical considerations",
            Topic::Closing => "closing notes",
        }
    }

    /// What to pivot to when this topic is entered by a forced transition.
    pub fn pivot_focus(self) -> &'static str {
        match self {
            Topic::Introduction => {
                "share the key pathology and genomic results in plain language."
            }
            Topic::Recommendation => {
                "present your recommended plan for next steps and why it fits."
            }
            Topic::Considerations => {
                "outline practical considerations: side effects, logistics, timelines, and support."
            }
            Topic::Closing => {
                "summarize the plan, reinforce support, and set follow-up expectations."
            }
        }
    }

    /// How to lead this topic when no pivot is due.
    pub fn lead_focus(self) -> &'static str {
        match self {
            Topic::Introduction => {
                "deliver the main results in 2-3 sentences, reassure, and invite a quick reaction."
            }
            Topic::Recommendation => {
                "state your treatment recommendation, include the rationale, and check the patient's understanding."
            }
            Topic::Considerations => {
                "proactively cover logistics, timeline, side effects, and patient responsibilities in plain language."
            }
            Topic::Closing => {
                "summarize the plan, confirm next steps, reassure your availability, and invite any final questions."
            }
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topic::Introduction => "introduction",
            Topic::Recommendation => "recommendation",
            Topic::Considerations => "considerations",
            Topic::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Completion state of every topic plus the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agenda {
    completed: BTreeMap<Topic, bool>,
    active: Option<Topic>,
    exchanges: u32,
    just_transitioned: bool,
}

impl Default for Agenda {
    fn default() -> Self {
        Self::new()
    }
}

impl Agenda {
    /// Creates an agenda with every topic incomplete and nothing active yet.
    pub fn new() -> Self {
        Self {
            completed: Topic::ORDER.iter().map(|t| (*t, false)).collect(),
            active: None,
            exchanges: 0,
            just_transitioned: false,
        }
    }

    /// Activates the first topic for the opening turn.
    pub fn begin(&mut self) {
        self.active = self.next_incomplete_topic();
        self.exchanges = 0;
        self.just_transitioned = false;
    }

    pub fn is_complete(&self, topic: Topic) -> bool {
        self.completed.get(&topic).copied().unwrap_or(false)
    }

    pub fn all_complete(&self) -> bool {
        self.completed.values().all(|done| *done)
    }

    pub fn active_topic(&self) -> Option<Topic> {
        self.active
    }

    pub fn exchange_count(&self) -> u32 {
        self.exchanges
    }

    pub fn just_transitioned(&self) -> bool {
        self.just_transitioned
    }

    /// First topic in agenda order that is not yet complete.
    pub fn next_incomplete_topic(&self) -> Option<Topic> {
        Topic::ORDER.into_iter().find(|t| !self.is_complete(*t))
    }

    /// First incomplete topic other than the active one.
    pub fn next_after_active(&self) -> Option<Topic> {
        Topic::ORDER
            .into_iter()
            .find(|t| !self.is_complete(*t) && Some(*t) != self.active)
    }

    pub fn remaining(&self) -> Vec<Topic> {
        Topic::ORDER
            .into_iter()
            .filter(|t| !self.is_complete(*t))
            .collect()
    }

    /// True once the active topic has had `MAX_TOPIC_EXCHANGES` exchanges.
    pub fn should_force_transition(&self) -> bool {
        self.active.is_some() && self.exchanges >= MAX_TOPIC_EXCHANGES
    }

    /// Completes the active topic and moves to the next incomplete one,
    /// raising the one-shot pivot flag for the next lead hint.
    pub fn transition(&mut self) {
        let Some(current) = self.active else {
            return;
        };
        self.mark_complete(current);
        self.active = self.next_incomplete_topic();
        self.exchanges = 0;
        self.just_transitioned = true;
        debug!(from = %current, to = ?self.active, "Agenda transition");
    }

    /// Clears the pivot flag once the lead has spoken.
    pub fn consume_transition_flag(&mut self) {
        self.just_transitioned = false;
    }

    /// Completes the introduction after the opening turn and moves on
    /// without raising the pivot flag.
    pub fn complete_opening(&mut self) {
        if let Some(current) = self.active {
            self.mark_complete(current);
        }
        self.active = self.next_incomplete_topic();
        self.exchanges = 0;
        self.just_transitioned = false;
    }

    /// Records one lead turn on the active topic. Closing is a single-turn
    /// topic and completes as soon as the lead has spoken on it.
    pub fn record_lead_exchange(&mut self) {
        let Some(current) = self.active else {
            self.exchanges = 0;
            return;
        };
        self.exchanges = self.exchanges.saturating_add(1);
        if current == Topic::Closing {
            self.mark_complete(Topic::Closing);
            self.active = None;
            self.exchanges = 0;
            debug!("Closing topic delivered; agenda complete");
        }
    }

    fn mark_complete(&mut self, topic: Topic) {
        self.completed.insert(topic, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_incomplete_follows_fixed_order() {
        let mut agenda = Agenda::new();
        assert_eq!(agenda.next_incomplete_topic(), Some(Topic::Introduction));
        agenda.begin();
        agenda.complete_opening();
        assert_eq!(agenda.active_topic(), Some(Topic::Recommendation));
        assert_eq!(agenda.next_incomplete_topic(), Some(Topic::Recommendation));
        assert!(!agenda.just_transitioned());
    }

    #[test]
    fn transition_is_forced_after_two_exchanges() {
        let mut agenda = Agenda::new();
        agenda.begin();
        agenda.complete_opening();

        agenda.record_lead_exchange();
        assert!(!agenda.should_force_transition());
        agenda.record_lead_exchange();
        assert!(agenda.should_force_transition());

        agenda.transition();
        assert!(agenda.is_complete(Topic::Recommendation));
        assert_eq!(agenda.active_topic(), Some(Topic::Considerations));
        assert_eq!(agenda.exchange_count(), 0);
        assert!(agenda.just_transitioned());

        agenda.consume_transition_flag();
        assert!(!agenda.just_transitioned());
    }

    #[test]
    fn closing_completes_after_one_lead_turn() {
        let mut agenda = Agenda::new();
        agenda.begin();
        agenda.complete_opening();
        for _ in 0..2 {
            for _ in 0..MAX_TOPIC_EXCHANGES {
                agenda.record_lead_exchange();
            }
            agenda.transition();
        }
        assert_eq!(agenda.active_topic(), Some(Topic::Closing));

        agenda.record_lead_exchange();
        assert!(agenda.all_complete());
        assert_eq!(agenda.active_topic(), None);
        assert!(!agenda.should_force_transition());
        assert!(agenda.remaining().is_empty());
    }

    #[test]
    fn completion_is_never_reopened() {
        let mut agenda = Agenda::new();
        agenda.begin();
        agenda.complete_opening();
        let mut seen_complete = Vec::new();
        for _ in 0..20 {
            if agenda.should_force_transition() {
                agenda.transition();
            }
            agenda.record_lead_exchange();
            agenda.consume_transition_flag();
            for topic in Topic::ORDER {
                if seen_complete.contains(&topic) {
                    assert!(agenda.is_complete(topic), "{topic} was reopened");
                } else if agenda.is_complete(topic) {
                    seen_complete.push(topic);
                }
            }
        }
        assert!(agenda.all_complete());
    }

    #[test]
    fn transition_without_active_topic_is_a_no_op() {
        let mut agenda = Agenda::new();
        agenda.transition();
        assert_eq!(agenda.active_topic(), None);
        assert!(!agenda.just_transitioned());
    }
}
