//! Termination Policy
//!
//! A closed rule set evaluated after every turn: explicit stop, exhausted
//! exchange budget, or a mutual natural-closing signal in the latest turns.

use crate::persona::Role;
use crate::session::ConversationSession;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum transcript length before a natural closing is recognised.
pub const MIN_TURNS_FOR_NATURAL_END: usize = 10;

pub const DEFAULT_SIGNAL_PHRASES: &[&str] = &[
    "follow up",
    "see you in",
    "any other questions",
    "schedule",
    "next appointment",
    "we'll meet again",
    "touch base",
    "check back",
];

pub const DEFAULT_ACKNOWLEDGMENT_PHRASES: &[&str] = &[
    "no, that's all",
    "no that's all",
    "that's all",
    "no questions",
    "no more questions",
    "thank you",
    "thanks",
    "sounds good",
    "understood",
    "okay",
    "ok",
];

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    StopRequested,
    TurnBudgetExhausted,
    NaturalClosing,
}

/// Read-only phrase lists; one instance can be shared across sessions.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    signal_phrases: Vec<String>,
    acknowledgment_phrases: Vec<String>,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_SIGNAL_PHRASES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_ACKNOWLEDGMENT_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl TerminationPolicy {
    /// Phrases are matched as lower-case substrings.
    pub fn new(signal_phrases: Vec<String>, acknowledgment_phrases: Vec<String>) -> Self {
        Self {
            signal_phrases: signal_phrases.into_iter().map(|p| p.to_lowercase()).collect(),
            acknowledgment_phrases: acknowledgment_phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn should_end(&self, session: &ConversationSession) -> bool {
        self.end_reason(session).is_some()
    }

    /// The first rule that holds, if any.
    pub fn end_reason(&self, session: &ConversationSession) -> Option<EndReason> {
        if session.stop_requested() {
            return Some(EndReason::StopRequested);
        }
        if session.exchange_count() >= session.max_exchanges() {
            return Some(EndReason::TurnBudgetExhausted);
        }
        if self.natural_closing(session) {
            return Some(EndReason::NaturalClosing);
        }
        None
    }

    fn natural_closing(&self, session: &ConversationSession) -> bool {
        let transcript = session.transcript();
        if transcript.len() < MIN_TURNS_FOR_NATURAL_END {
            return false;
        }
        let lead_last = transcript
            .last_by(Role::Lead)
            .map(|t| t.content.to_lowercase())
            .unwrap_or_default();
        if !contains_any(&lead_last, &self.signal_phrases) {
            return false;
        }

        let respondent_last = transcript
            .last_by(Role::Respondent)
            .map(|t| t.content.to_lowercase())
            .unwrap_or_default();
        if contains_any(&respondent_last, &self.acknowledgment_phrases) {
            debug!("Lead signalled closing and respondent acknowledged");
            return true;
        }

        let turns = transcript.turns();
        let combined = turns[turns.len().saturating_sub(2)..]
            .iter()
            .map(|t| t.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        contains_any(&combined, &self.acknowledgment_phrases)
    }
}

fn contains_any(haystack: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| haystack.contains(phrase.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Turn;

    fn session_with(pairs: usize, lead: &str, respondent: &str, max: usize) -> ConversationSession {
        let mut session = ConversationSession::new("case", max);
        for _ in 0..pairs {
            session
                .record(Turn::new("Dr", Role::Lead, lead, "Stub"))
                .unwrap();
            session
                .record(Turn::new("Pt", Role::Respondent, respondent, "Stub"))
                .unwrap();
        }
        session
    }

    #[test]
    fn stop_request_ends_session() {
        let mut session = session_with(1, "Hello.", "Hi.", 20);
        let policy = TerminationPolicy::default();
        assert!(!policy.should_end(&session));
        session.request_stop();
        assert_eq!(policy.end_reason(&session), Some(EndReason::StopRequested));
    }

    #[test]
    fn exchange_budget_ends_session() {
        let mut session = session_with(1, "Hello.", "Hi.", 2);
        let policy = TerminationPolicy::default();
        session.complete_exchange();
        assert!(!policy.should_end(&session));
        session.complete_exchange();
        assert_eq!(
            policy.end_reason(&session),
            Some(EndReason::TurnBudgetExhausted)
        );
    }

    #[test]
    fn natural_closing_needs_ten_turns() {
        let policy = TerminationPolicy::default();
        let short = session_with(4, "Let's schedule a follow up.", "Thank you.", 20);
        assert!(!policy.should_end(&short));
        let long = session_with(5, "Let's schedule a follow up.", "Thank you.", 20);
        assert_eq!(policy.end_reason(&long), Some(EndReason::NaturalClosing));
    }

    #[test]
    fn natural_closing_needs_both_sides() {
        let policy = TerminationPolicy::default();
        let no_signal = session_with(5, "Chemo lasts four months.", "Thanks.", 20);
        assert!(!policy.should_end(&no_signal));
        let no_ack = session_with(5, "We'll schedule surgery.", "Why so soon?", 20);
        assert!(!policy.should_end(&no_ack));
    }

    #[test]
    fn combined_fallback_tolerates_ordering() {
        let policy = TerminationPolicy::default();
        // Transcript ends on a lead turn that both signals and acknowledges.
        let mut session = session_with(5, "Hello.", "Why?", 20);
        session
            .record(Turn::new(
                "Dr",
                Role::Lead,
                "Okay, let's touch base next week.",
                "Stub",
            ))
            .unwrap();
        assert_eq!(policy.end_reason(&session), Some(EndReason::NaturalClosing));
    }

    #[test]
    fn should_end_is_stable_without_new_turns() {
        let policy = TerminationPolicy::default();
        let session = session_with(5, "See you in two weeks.", "Sounds good.", 20);
        for _ in 0..3 {
            assert!(policy.should_end(&session));
        }
    }
}
