//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the conversation store and generator bindings.

use crate::{config::Config, providers::GeneratorFactory, store::ConversationStore};
use consult_core::{
    TerminationPolicy, case_library::CaseProvider, speech::SpeechSynthesizer,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub generators: Arc<dyn GeneratorFactory>,
    pub cases: Arc<dyn CaseProvider>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub policy: Arc<TerminationPolicy>,
    pub config: Arc<Config>,
}
