//! Binds providers and models to text generators.

use async_openai::config::OpenAIConfig;
use consult_core::{
    llm_client::{OpenAICompatibleClient, TextGenerator},
    speech::{OpenAISpeech, SpeechSynthesizer},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, ConfigError, Provider};

/// Creates the generator that speaks for one persona.
pub trait GeneratorFactory: Send + Sync {
    fn generator(
        &self,
        provider: Provider,
        model: &str,
    ) -> Result<Arc<dyn TextGenerator>, ConfigError>;
}

/// Builds OpenAI-compatible clients from the keys in [`Config`].
pub struct ProviderRegistry {
    config: Arc<Config>,
}

impl ProviderRegistry {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn client_config(&self, provider: Provider) -> Result<OpenAIConfig, ConfigError> {
        let api_key = self.config.require_key(provider)?;
        Ok(OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(provider.api_base()))
    }
}

impl GeneratorFactory for ProviderRegistry {
    fn generator(
        &self,
        provider: Provider,
        model: &str,
    ) -> Result<Arc<dyn TextGenerator>, ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "model".to_string(),
                "model name must not be empty".to_string(),
            ));
        }
        let client_config = self.client_config(provider)?;
        info!(%provider, %model, "Binding text generator");
        Ok(Arc::new(OpenAICompatibleClient::new(
            client_config,
            model,
            provider.label(),
        )))
    }
}

/// Voice synthesis, when enabled and an OpenAI key is available.
pub fn speech_synthesizer(config: &Config) -> Option<Arc<dyn SpeechSynthesizer>> {
    if !config.enable_tts {
        return None;
    }
    match config.require_key(Provider::OpenAI) {
        Ok(api_key) => {
            let client_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(Provider::OpenAI.api_base());
            Some(Arc::new(OpenAISpeech::new(client_config)))
        }
        Err(e) => {
            warn!("ENABLE_TTS is set but speech is unavailable: {}", e);
            None
        }
    }
}
