//! Turns a request into a ready-to-run orchestrator and a finished one into
//! a storable record.

use consult_core::{
    LeadKind, Orchestrator, OrchestratorError, RespondentKind, Role, Speaker, TerminationPolicy,
    case_library::{BRCA2_CASE_ID, CaseError, CaseProvider, CaseSelection},
    export::ExportMetadata,
    session::ConversationSession,
};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, ConfigError, Provider};
use crate::models::{CreateConversationPayload, MessageRecord, NewConversation};
use crate::providers::GeneratorFactory;

/// Accepted exchange budgets.
pub const MAX_TURNS_RANGE: RangeInclusive<usize> = 1..=50;

/// Accepted sampling temperatures.
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Unknown lead type '{0}'")]
    UnknownLead(String),
    #[error("Unknown respondent type '{0}'")]
    UnknownRespondent(String),
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("max_turns must be between 1 and 50, got {0}")]
    InvalidMaxTurns(usize),
    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    InvalidTemperature(f32),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Case(#[from] CaseError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    pub lead: LeadKind,
    pub respondent: RespondentKind,
    pub lead_provider: Provider,
    pub respondent_provider: Provider,
    pub lead_model: String,
    pub respondent_model: String,
    pub max_turns: usize,
    /// Replaces both personas' temperature when set.
    pub temperature: Option<f32>,
    pub case: CaseSelection,
}

fn parse_provider(name: Option<&String>) -> Result<Option<Provider>, SimulationError> {
    name.map(|n| Provider::parse(n).ok_or_else(|| SimulationError::UnknownProvider(n.clone())))
        .transpose()
}

impl SimulationPlan {
    /// Fills omitted fields from `config`; the built-in case is the default.
    pub fn from_payload(
        payload: &CreateConversationPayload,
        config: &Config,
    ) -> Result<Self, SimulationError> {
        let lead = LeadKind::from_slug(&payload.lead_type)
            .ok_or_else(|| SimulationError::UnknownLead(payload.lead_type.clone()))?;
        let respondent = RespondentKind::from_slug(&payload.respondent_type)
            .ok_or_else(|| SimulationError::UnknownRespondent(payload.respondent_type.clone()))?;
        let provider = parse_provider(payload.provider.as_ref())?.unwrap_or(config.default_provider);
        let lead_provider = parse_provider(payload.lead_provider.as_ref())?.unwrap_or(provider);
        let respondent_provider =
            parse_provider(payload.respondent_provider.as_ref())?.unwrap_or(provider);

        let max_turns = payload.max_turns.unwrap_or(config.default_max_turns);
        if !MAX_TURNS_RANGE.contains(&max_turns) {
            return Err(SimulationError::InvalidMaxTurns(max_turns));
        }
        if let Some(t) = payload.temperature.filter(|t| !TEMPERATURE_RANGE.contains(t)) {
            return Err(SimulationError::InvalidTemperature(t));
        }
        let case = match (&payload.custom_case, &payload.case_id) {
            (Some(text), _) => CaseSelection::Custom(text.clone()),
            (None, Some(id)) => CaseSelection::Library(id.clone()),
            (None, None) => CaseSelection::Library(BRCA2_CASE_ID.to_string()),
        };

        Ok(Self {
            lead,
            respondent,
            lead_provider,
            respondent_provider,
            lead_model: payload
                .lead_model
                .clone()
                .unwrap_or_else(|| config.model_for(lead_provider, Role::Lead)),
            respondent_model: payload
                .respondent_model
                .clone()
                .unwrap_or_else(|| config.model_for(respondent_provider, Role::Respondent)),
            max_turns,
            temperature: payload.temperature,
            case,
        })
    }

    /// Binds generators and opens the session. Every configuration failure
    /// surfaces here, before any turn is produced.
    pub fn prepare(
        self,
        generators: &dyn GeneratorFactory,
        cases: &dyn CaseProvider,
        policy: Arc<TerminationPolicy>,
    ) -> Result<Simulation, SimulationError> {
        let resolved = self.case.resolve(cases)?;
        let lead_generator = generators.generator(self.lead_provider, &self.lead_model)?;
        let respondent_generator =
            generators.generator(self.respondent_provider, &self.respondent_model)?;

        let (mut lead_persona, mut respondent_persona) =
            (self.lead.persona(), self.respondent.persona());
        if let Some(t) = self.temperature {
            lead_persona = lead_persona.with_temperature(t);
            respondent_persona = respondent_persona.with_temperature(t);
        }

        let orchestrator = Orchestrator::new(
            Speaker::new(lead_persona, lead_generator),
            Speaker::new(respondent_persona, respondent_generator),
            ConversationSession::new(resolved.text, self.max_turns),
        )?
        .with_policy(policy);

        info!(
            lead = self.lead.slug(),
            respondent = self.respondent.slug(),
            lead_provider = %self.lead_provider,
            respondent_provider = %self.respondent_provider,
            max_turns = self.max_turns,
            "Simulation prepared"
        );

        let case_id = match &self.case {
            CaseSelection::Library(id) => Some(id.clone()),
            CaseSelection::Custom(_) => None,
        };
        Ok(Simulation {
            orchestrator,
            lead: self.lead,
            respondent: self.respondent,
            case_id,
            case_title: resolved.title,
        })
    }
}

pub struct Simulation {
    pub orchestrator: Orchestrator,
    lead: LeadKind,
    respondent: RespondentKind,
    case_id: Option<String>,
    case_title: Option<String>,
}

impl Simulation {
    pub fn case_title(&self) -> Option<&str> {
        self.case_title.as_deref()
    }

    /// Export metadata including the case title.
    pub fn metadata(&self) -> ExportMetadata {
        ExportMetadata {
            case_title: self.case_title.clone(),
            ..self.orchestrator.metadata()
        }
    }

    /// Snapshot of the transcript so far, ready for the store.
    pub fn to_new_conversation(&self) -> NewConversation {
        let stats = self.orchestrator.stats();
        NewConversation {
            lead_type: self.lead.slug().to_string(),
            respondent_type: self.respondent.slug().to_string(),
            lead_model: stats.lead_model.clone(),
            respondent_model: stats.respondent_model.clone(),
            case_id: self.case_id.clone(),
            case_title: self.case_title.clone(),
            messages: self
                .orchestrator
                .session()
                .transcript()
                .turns()
                .iter()
                .map(MessageRecord::from)
                .collect(),
            statistics: stats,
        }
    }
}
