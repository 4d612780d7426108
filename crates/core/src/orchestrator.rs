//! Conversation Orchestrator
//!
//! Drives a bounded, strictly sequential exchange between a lead and a
//! respondent. Each call to [`Orchestrator::next_turn`] performs exactly one
//! generation step, so the conversation can be consumed lazily as a stream
//! and cancelled between steps.
//!
//! ```text
//! Opening: lead speaks from the case text, introduction completes
//! Loop:    [end?] respondent -> [end?] transition? -> lead -> exchange++
//! Finished: stream exhausted, not restartable
//! ```

use crate::coaching::{HintContext, build_hint};
use crate::control::SessionControl;
use crate::executor::{Speaker, TurnExecutor, TurnFragment, TurnInput};
use crate::export::{ExportMetadata, render_text};
use crate::persona::Role;
use crate::session::{ConversationSession, ConversationStats};
use crate::termination::{EndReason, TerminationPolicy};
use crate::transcript::{TranscriptError, Turn};
use futures::{Stream, stream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("{name} cannot speak as {expected}: persona role is {actual}")]
    RoleMismatch {
        name: String,
        expected: Role,
        actual: Role,
    },
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Opening,
    Respondent,
    Lead,
    Finished,
}

pub struct Orchestrator {
    lead: Speaker,
    respondent: Speaker,
    session: ConversationSession,
    policy: Arc<TerminationPolicy>,
    executor: TurnExecutor,
    control: SessionControl,
    phase: Phase,
    end_reason: Option<EndReason>,
}

impl Orchestrator {
    /// Binds two speakers to a fresh session. Fails before any turn is
    /// produced if a persona is bound to the wrong role.
    pub fn new(
        lead: Speaker,
        respondent: Speaker,
        session: ConversationSession,
    ) -> Result<Self, OrchestratorError> {
        for (speaker, expected) in [(&lead, Role::Lead), (&respondent, Role::Respondent)] {
            if speaker.role() != expected {
                return Err(OrchestratorError::RoleMismatch {
                    name: speaker.persona().name().to_string(),
                    expected,
                    actual: speaker.role(),
                });
            }
        }
        Ok(Self {
            lead,
            respondent,
            session,
            policy: Arc::new(TerminationPolicy::default()),
            executor: TurnExecutor::new(),
            control: SessionControl::new(),
            phase: Phase::Opening,
            end_reason: None,
        })
    }

    /// Shares a termination policy (phrase lists) across sessions.
    pub fn with_policy(mut self, policy: Arc<TerminationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Uses an externally created control handle.
    pub fn with_control(mut self, control: SessionControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_fragment_sink(mut self, sink: mpsc::UnboundedSender<TurnFragment>) -> Self {
        self.executor = TurnExecutor::with_fragment_sink(sink);
        self
    }

    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Finished
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn into_session(self) -> ConversationSession {
        self.session
    }

    pub fn lead(&self) -> &Speaker {
        &self.lead
    }

    pub fn respondent(&self) -> &Speaker {
        &self.respondent
    }

    /// Produces the next turn, or `None` once the conversation has ended.
    #[instrument(skip_all, fields(exchange = self.session.exchange_count()))]
    pub async fn next_turn(&mut self) -> Result<Option<Turn>, OrchestratorError> {
        match self.phase {
            Phase::Finished => Ok(None),
            Phase::Opening => {
                if self.control.is_stopped() {
                    self.session.request_stop();
                    self.finish(Some(EndReason::StopRequested));
                    return Ok(None);
                }
                self.session.agenda_mut().begin();
                let input = TurnInput {
                    hint: self.hint(Role::Lead, true),
                    input: self.session.case_text().to_string(),
                    history: Vec::new(),
                };
                let turn = self
                    .executor
                    .generate_turn(&self.lead, input, &self.control)
                    .await;
                self.session.agenda_mut().complete_opening();
                self.commit(turn, Phase::Respondent).map(Some)
            }
            Phase::Respondent => {
                if self.check_end() {
                    return Ok(None);
                }
                let input = self.reply_input(Role::Respondent);
                let turn = self
                    .executor
                    .generate_turn(&self.respondent, input, &self.control)
                    .await;
                self.commit(turn, Phase::Lead).map(Some)
            }
            Phase::Lead => {
                if self.check_end() {
                    return Ok(None);
                }
                if self.session.agenda().should_force_transition() {
                    self.session.agenda_mut().transition();
                }
                let input = self.reply_input(Role::Lead);
                let turn = self
                    .executor
                    .generate_turn(&self.lead, input, &self.control)
                    .await;
                let agenda = self.session.agenda_mut();
                agenda.consume_transition_flag();
                agenda.record_lead_exchange();
                self.session.complete_exchange();
                self.commit(turn, Phase::Respondent).map(Some)
            }
        }
    }

    /// Lazily yields turns in production order until the conversation ends.
    /// Dropping the stream abandons the step in progress.
    pub fn turns(&mut self) -> impl Stream<Item = Result<Turn, OrchestratorError>> + '_ {
        stream::unfold(self, |orchestrator| async move {
            match orchestrator.next_turn().await {
                Ok(Some(turn)) => Some((Ok(turn), orchestrator)),
                Ok(None) => None,
                Err(e) => Some((Err(e), orchestrator)),
            }
        })
    }

    /// Runs to completion and returns the number of turns produced.
    pub async fn run_to_end(&mut self) -> Result<usize, OrchestratorError> {
        let mut produced = 0usize;
        while self.next_turn().await?.is_some() {
            produced = produced.saturating_add(1);
        }
        Ok(produced)
    }

    pub fn stats(&self) -> ConversationStats {
        let transcript = self.session.transcript();
        ConversationStats {
            total_turns: transcript.len(),
            lead_turns: transcript.count_by(Role::Lead),
            respondent_turns: transcript.count_by(Role::Respondent),
            exchange_count: self.session.exchange_count(),
            lead_name: self.lead.persona().name().to_string(),
            respondent_name: self.respondent.persona().name().to_string(),
            lead_model: self.lead.model_tag(),
            respondent_model: self.respondent.model_tag(),
        }
    }

    /// Export metadata describing this conversation's participants.
    pub fn metadata(&self) -> ExportMetadata {
        ExportMetadata {
            lead_name: self.lead.persona().name().to_string(),
            lead_type: self.lead.persona().kind().to_string(),
            lead_model: self.lead.model_tag(),
            respondent_name: self.respondent.persona().name().to_string(),
            respondent_type: self.respondent.persona().kind().to_string(),
            respondent_model: self.respondent.model_tag(),
            ..ExportMetadata::default()
        }
    }

    /// Full transcript as formatted plain text.
    pub fn conversation_text(&self) -> String {
        render_text(self.session.transcript().turns(), &self.metadata())
    }

    fn hint(&self, role: Role, is_opening: bool) -> String {
        build_hint(
            role,
            &HintContext {
                is_opening,
                agenda: self.session.agenda(),
                concerns: self.session.concerns(),
                last_question_by: self.session.last_question_by(),
            },
        )
    }

    fn reply_input(&self, role: Role) -> TurnInput {
        let transcript = self.session.transcript();
        TurnInput {
            hint: self.hint(role, false),
            input: transcript
                .last()
                .map(|t| t.content.clone())
                .unwrap_or_default(),
            history: transcript.history_for(role),
        }
    }

    fn check_end(&mut self) -> bool {
        if self.control.is_stopped() {
            self.session.request_stop();
        }
        match self.policy.end_reason(&self.session) {
            Some(reason) => {
                self.finish(Some(reason));
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, turn: Turn, next: Phase) -> Result<Turn, OrchestratorError> {
        if let Err(e) = self.session.record(turn.clone()) {
            self.finish(None);
            return Err(e.into());
        }
        self.phase = next;
        Ok(turn)
    }

    fn finish(&mut self, reason: Option<EndReason>) {
        if self.phase == Phase::Finished {
            return;
        }
        self.phase = Phase::Finished;
        self.end_reason = reason;
        info!(
            reason = ?reason,
            turns = self.session.transcript().len(),
            exchanges = self.session.exchange_count(),
            "Conversation finished"
        );
    }
}
