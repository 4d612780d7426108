//! Conversation session state.
//!
//! A `ConversationSession` is an explicit value owned by the caller. The
//! orchestrator mutates it turn by turn; nothing in the core keeps
//! process-wide state.

use crate::agenda::Agenda;
use crate::concerns::{ConcernSet, contains_question};
use crate::persona::Role;
use crate::transcript::{Transcript, TranscriptError, Turn};
use serde::{Deserialize, Serialize};

/// Default exchange budget for a session.
pub const DEFAULT_MAX_EXCHANGES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    case_text: String,
    transcript: Transcript,
    agenda: Agenda,
    concerns: ConcernSet,
    exchanges: usize,
    max_exchanges: usize,
    last_question_by: Option<Role>,
    stop_requested: bool,
}

impl ConversationSession {
    /// Creates a session for the given opening context and exchange budget.
    pub fn new(case_text: impl Into<String>, max_exchanges: usize) -> Self {
        Self {
            case_text: case_text.into(),
            transcript: Transcript::new(),
            agenda: Agenda::new(),
            concerns: ConcernSet::default(),
            exchanges: 0,
            max_exchanges,
            last_question_by: None,
            stop_requested: false,
        }
    }

    pub fn case_text(&self) -> &str {
        &self.case_text
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    pub(crate) fn agenda_mut(&mut self) -> &mut Agenda {
        &mut self.agenda
    }

    pub fn concerns(&self) -> &ConcernSet {
        &self.concerns
    }

    pub fn last_question_by(&self) -> Option<Role> {
        self.last_question_by
    }

    /// Completed lead/respondent exchanges (the opening turn is not one).
    pub fn exchange_count(&self) -> usize {
        self.exchanges
    }

    pub fn max_exchanges(&self) -> usize {
        self.max_exchanges
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn complete_exchange(&mut self) {
        self.exchanges = self.exchanges.saturating_add(1);
    }

    /// Appends a finalized turn and updates the heuristic memory derived from it.
    pub fn record(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        self.transcript.push(turn)?;
        if let Some(turn) = self.transcript.last() {
            if turn.role == Role::Respondent {
                self.concerns.absorb(&turn.content);
            }
            if contains_question(&turn.content) {
                self.last_question_by = Some(turn.role);
            }
        }
        Ok(())
    }
}

/// Synchronous snapshot of a session's counts and participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_turns: usize,
    pub lead_turns: usize,
    pub respondent_turns: usize,
    pub exchange_count: usize,
    pub lead_name: String,
    pub respondent_name: String,
    pub lead_model: String,
    pub respondent_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_questions_and_concerns() {
        let mut session = ConversationSession::new("case", 5);
        session
            .record(Turn::new("Dr", Role::Lead, "Any questions so far?", "m"))
            .unwrap();
        assert_eq!(session.last_question_by(), Some(Role::Lead));

        session
            .record(Turn::new(
                "Pt",
                Role::Respondent,
                "Will the chemo cost much? I'm scared.",
                "m",
            ))
            .unwrap();
        assert_eq!(session.last_question_by(), Some(Role::Respondent));
        assert!(session.concerns().contains("chemotherapy"));
        assert!(session.concerns().contains("cost"));
        assert!(session.concerns().contains("fear"));
    }

    #[test]
    fn lead_text_does_not_feed_concerns() {
        let mut session = ConversationSession::new("case", 5);
        session
            .record(Turn::new("Dr", Role::Lead, "Chemo and a clinical trial.", "m"))
            .unwrap();
        assert!(session.concerns().is_empty());
        assert_eq!(session.last_question_by(), None);
    }

    #[test]
    fn rejected_turn_leaves_state_untouched() {
        let mut session = ConversationSession::new("case", 5);
        let before = session.clone();
        assert!(
            session
                .record(Turn::new("Pt", Role::Respondent, "Is it chemo?", "m"))
                .is_err()
        );
        assert_eq!(session.transcript(), before.transcript());
        assert_eq!(session.last_question_by(), None);
    }
}
