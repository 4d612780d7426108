use crate::llm_client::{ChatRole, PriorTurn};
use crate::persona::Role;
use serde::{Deserialize, Serialize};

/// One finalized utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker_name: String,
    pub role: Role,
    pub content: String,
    pub model_tag: String,
}

impl Turn {
    pub fn new(
        speaker_name: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        model_tag: impl Into<String>,
    ) -> Self {
        Self {
            speaker_name: speaker_name.into(),
            role,
            content: content.into(),
            model_tag: model_tag.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Turn {index} must be spoken by the {expected} role, got {actual}")]
    OutOfOrder {
        index: usize,
        expected: Role,
        actual: Role,
    },
}

/// Append-only, strictly alternating record of a conversation, opened by the lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// The role that must speak next.
    pub fn next_role(&self) -> Role {
        self.turns.last().map_or(Role::Lead, |t| t.role.other())
    }

    /// Appends a turn, rejecting any that would break lead/respondent alternation.
    pub fn push(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        let expected = self.next_role();
        if turn.role != expected {
            return Err(TranscriptError::OutOfOrder {
                index: self.turns.len(),
                expected,
                actual: turn.role,
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Most recent turn spoken by `role`.
    pub fn last_by(&self, role: Role) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == role)
    }

    pub fn count_by(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    /// Prior turns seen from `speaker`'s point of view: its own turns are
    /// `assistant` entries and the other party's are `user` entries.
    pub fn history_for(&self, speaker: Role) -> Vec<PriorTurn> {
        self.turns
            .iter()
            .map(|t| PriorTurn {
                role: if t.role == speaker {
                    ChatRole::Assistant
                } else {
                    ChatRole::User
                },
                content: t.content.clone(),
            })
            .collect()
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str) -> Turn {
        Turn::new("speaker", role, content, "Stub (test)")
    }

    #[test]
    fn rejects_respondent_opening() {
        let mut transcript = Transcript::new();
        let err = transcript.push(turn(Role::Respondent, "hi")).unwrap_err();
        assert_eq!(
            err,
            TranscriptError::OutOfOrder {
                index: 0,
                expected: Role::Lead,
                actual: Role::Respondent,
            }
        );
        assert!(transcript.is_empty());
    }

    #[test]
    fn rejects_two_lead_turns_in_a_row() {
        let mut transcript = Transcript::new();
        transcript.push(turn(Role::Lead, "hello")).unwrap();
        assert!(transcript.push(turn(Role::Lead, "again")).is_err());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn history_is_relative_to_speaker() {
        let mut transcript = Transcript::new();
        transcript.push(turn(Role::Lead, "results")).unwrap();
        transcript.push(turn(Role::Respondent, "okay?")).unwrap();

        let lead_view = transcript.history_for(Role::Lead);
        assert_eq!(lead_view[0].role, ChatRole::Assistant);
        assert_eq!(lead_view[1].role, ChatRole::User);

        let respondent_view = transcript.history_for(Role::Respondent);
        assert_eq!(respondent_view[0].role, ChatRole::User);
        assert_eq!(respondent_view[1].content, "okay?");
    }

    #[test]
    fn last_by_role_and_counts() {
        let mut transcript = Transcript::new();
        transcript.push(turn(Role::Lead, "a")).unwrap();
        transcript.push(turn(Role::Respondent, "b")).unwrap();
        transcript.push(turn(Role::Lead, "c")).unwrap();

        assert_eq!(transcript.last_by(Role::Lead).unwrap().content, "c");
        assert_eq!(transcript.last_by(Role::Respondent).unwrap().content, "b");
        assert_eq!(transcript.count_by(Role::Lead), 2);
        assert_eq!(transcript.next_role(), Role::Respondent);
    }
}
