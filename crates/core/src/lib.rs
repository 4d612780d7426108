pub mod agenda;
pub mod case_library;
pub mod coaching;
pub mod concerns;
pub mod control;
pub mod executor;
pub mod export;
pub mod llm_client;
pub mod orchestrator;
pub mod persona;
pub mod session;
pub mod speech;
pub mod termination;
pub mod transcript;

pub use control::SessionControl;
pub use executor::{Speaker, TurnFragment};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use persona::{LeadKind, Persona, RespondentKind, Role};
pub use session::{ConversationSession, ConversationStats};
pub use termination::{EndReason, TerminationPolicy};
pub use transcript::{Transcript, Turn};
