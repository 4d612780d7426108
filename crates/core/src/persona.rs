//! Persona definitions for both sides of the visit.
//!
//! A persona is plain data: a display name, one of the two structural roles,
//! instruction text and sampling parameters. All behavioural differences
//! between personas live in their instructions, never in code paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two structural roles in a dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Drives the agenda (the oncologist).
    Lead,
    /// Reacts to the lead (the patient).
    Respondent,
}

impl Role {
    /// Returns the opposite role.
    pub fn other(self) -> Self {
        match self {
            Role::Lead => Role::Respondent,
            Role::Respondent => Role::Lead,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Lead => write!(f, "lead"),
            Role::Respondent => write!(f, "respondent"),
        }
    }
}

/// Sampling parameters passed through to the text generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// An immutable persona bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    name: String,
    kind: String,
    role: Role,
    instructions: String,
    sampling: SamplingParams,
}

impl Persona {
    /// Creates a persona. `kind` is a short slug (e.g. "conservative")
    /// recorded alongside persisted conversations.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        role: Role,
        instructions: impl Into<String>,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            role,
            instructions: instructions.into(),
            sampling,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn sampling(&self) -> SamplingParams {
        self.sampling
    }

    /// A copy of this persona sampling at `temperature`.
    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            sampling: SamplingParams {
                temperature,
                ..self.sampling
            },
            ..self.clone()
        }
    }
}

const LEAD_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.7,
    max_output_tokens: 350,
};

const RESPONDENT_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.9,
    max_output_tokens: 100,
};

/// Built-in lead personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadKind {
    Conservative,
    Liberal,
}

impl LeadKind {
    pub const ALL: [LeadKind; 2] = [LeadKind::Conservative, LeadKind::Liberal];

    pub fn slug(self) -> &'static str {
        match self {
            LeadKind::Conservative => "conservative",
            LeadKind::Liberal => "liberal",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    pub fn persona(self) -> Persona {
        match self {
            LeadKind::Conservative => Persona::new(
                "Dr. Anderson (Conservative)",
                self.slug(),
                Role::Lead,
                include_str!("../prompts/lead_conservative.md"),
                LEAD_SAMPLING,
            ),
            LeadKind::Liberal => Persona::new(
                "Dr. Chen (Liberal/Progressive)",
                self.slug(),
                Role::Lead,
                include_str!("../prompts/lead_liberal.md"),
                LEAD_SAMPLING,
            ),
        }
    }
}

/// Built-in respondent personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RespondentKind {
    DoMore,
    DoLess,
}

impl RespondentKind {
    pub const ALL: [RespondentKind; 2] = [RespondentKind::DoMore, RespondentKind::DoLess];

    pub fn slug(self) -> &'static str {
        match self {
            RespondentKind::DoMore => "do-more",
            RespondentKind::DoLess => "do-less",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    pub fn persona(self) -> Persona {
        match self {
            RespondentKind::DoMore => Persona::new(
                "Sarah (Do-More Patient)",
                self.slug(),
                Role::Respondent,
                include_str!("../prompts/respondent_do_more.md"),
                RESPONDENT_SAMPLING,
            ),
            RespondentKind::DoLess => Persona::new(
                "Linda (Do-Less Patient)",
                self.slug(),
                Role::Respondent,
                include_str!("../prompts/respondent_do_less.md"),
                RESPONDENT_SAMPLING,
            ),
        }
    }
}
