//! Turn Executor
//!
//! Runs one generation step for a persona: streams the reply, checks its
//! shape against role-specific caps and, if needed, issues a single
//! non-streaming revision request. The original text is kept when the
//! revision comes back empty; retries never loop.

use crate::control::SessionControl;
use crate::llm_client::{GenerationRequest, PriorTurn, TextGenerator};
use crate::persona::{Persona, Role};
use crate::transcript::Turn;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A persona bound to the generator that speaks for it.
#[derive(Clone)]
pub struct Speaker {
    persona: Persona,
    generator: Arc<dyn TextGenerator>,
}

impl Speaker {
    pub fn new(persona: Persona, generator: Arc<dyn TextGenerator>) -> Self {
        Self { persona, generator }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn role(&self) -> Role {
        self.persona.role()
    }

    pub fn model_tag(&self) -> String {
        self.generator.model_tag()
    }
}

/// A streamed piece of a turn still being generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFragment {
    pub speaker_name: String,
    pub role: Role,
    pub text: String,
}

/// Role-specific reply caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeLimits {
    pub max_sentences: usize,
    pub max_chars: usize,
    /// Target used in the revision instruction.
    pub revision_range: &'static str,
}

impl ShapeLimits {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Lead => Self {
                max_sentences: 6,
                max_chars: 1200,
                revision_range: "2-5 concise",
            },
            Role::Respondent => Self {
                max_sentences: 3,
                max_chars: 800,
                revision_range: "1-3 short",
            },
        }
    }
}

/// Counts `.`-delimited non-empty segments.
pub fn sentence_count(text: &str) -> usize {
    text.replace('\n', " ")
        .split('.')
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

/// True when a reply is empty or exceeds the caps for `role`.
pub fn needs_revision(text: &str, role: Role) -> bool {
    let stripped = text.trim();
    if stripped.is_empty() {
        return true;
    }
    let limits = ShapeLimits::for_role(role);
    sentence_count(stripped) > limits.max_sentences || stripped.chars().count() > limits.max_chars
}

fn revision_instruction(role: Role) -> String {
    format!(
        "Revise your previous answer to {} sentences. Respond directly to the last point. \
         No lists, no headers.",
        ShapeLimits::for_role(role).revision_range
    )
}

/// Inputs for one turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub hint: String,
    /// Case text for the opening turn, otherwise the last turn's content.
    pub input: String,
    pub history: Vec<PriorTurn>,
}

#[derive(Default)]
pub struct TurnExecutor {
    fragments: Option<mpsc::UnboundedSender<TurnFragment>>,
}

impl TurnExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards every streamed fragment to `sink` while turns are generated.
    pub fn with_fragment_sink(sink: mpsc::UnboundedSender<TurnFragment>) -> Self {
        Self {
            fragments: Some(sink),
        }
    }

    /// Generates, validates and finalizes one turn for `speaker`.
    pub async fn generate_turn(
        &self,
        speaker: &Speaker,
        turn: TurnInput,
        control: &SessionControl,
    ) -> Turn {
        let persona = speaker.persona();
        let role = persona.role();
        let sampling = persona.sampling();
        let request = GenerationRequest {
            system_instructions: persona.instructions().to_string(),
            prior_turns: turn.history.clone(),
            new_input: format!("{}\n\n{}", turn.hint, turn.input),
            temperature: sampling.temperature,
            max_tokens: sampling.max_output_tokens,
        };

        let mut stream = speaker.generator.stream(request).await;
        let mut content = String::new();
        while let Some(fragment) = stream.next().await {
            content.push_str(&fragment);
            if let Some(sink) = &self.fragments {
                // A dropped receiver only means nobody is watching.
                let _ = sink.send(TurnFragment {
                    speaker_name: persona.name().to_string(),
                    role,
                    text: fragment,
                });
            }
        }

        if needs_revision(&content, role) {
            if control.is_stopped() {
                debug!(speaker = %persona.name(), "Stop requested; skipping revision");
            } else {
                warn!(
                    speaker = %persona.name(),
                    %role,
                    sentences = sentence_count(&content),
                    chars = content.trim().chars().count(),
                    "Reply outside shape limits; requesting one revision"
                );
                let revision = GenerationRequest {
                    system_instructions: persona.instructions().to_string(),
                    prior_turns: turn.history,
                    new_input: format!("{}\n\n{}", turn.hint, revision_instruction(role)),
                    temperature: sampling.temperature,
                    max_tokens: sampling.max_output_tokens,
                };
                let revised = speaker.generator.complete(revision).await;
                if revised.trim().is_empty() {
                    warn!(speaker = %persona.name(), "Revision was empty; keeping original reply");
                } else {
                    content = revised;
                }
            }
        }

        info!(
            speaker = %persona.name(),
            %role,
            chars = content.chars().count(),
            "Turn finalized"
        );
        Turn::new(persona.name(), role, content, speaker.model_tag())
    }
}
