//! Voice synthesis for finalized turns.
//!
//! Synthesis is best-effort: a failure is logged and yields no audio, it
//! never affects the conversation itself.

use crate::persona::Role;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
};
use async_trait::async_trait;
use tracing::{debug, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// MP3 bytes for `text` spoken in the voice assigned to `role`.
    async fn synthesize(&self, text: &str, role: Role) -> Option<Vec<u8>>;
}

/// OpenAI text-to-speech with one voice per role.
pub struct OpenAISpeech {
    client: Client<OpenAIConfig>,
    speed: f32,
}

impl OpenAISpeech {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
            speed: 1.5,
        }
    }

    pub fn voice_for(role: Role) -> Voice {
        match role {
            Role::Lead => Voice::Onyx,
            Role::Respondent => Voice::Nova,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeech {
    async fn synthesize(&self, text: &str, role: Role) -> Option<Vec<u8>> {
        if text.trim().is_empty() {
            return None;
        }
        let request = match CreateSpeechRequestArgs::default()
            .model(SpeechModel::Tts1)
            .input(text)
            .voice(Self::voice_for(role))
            .response_format(SpeechResponseFormat::Mp3)
            .speed(self.speed)
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                warn!(%role, "Failed to build speech request: {}", e);
                return None;
            }
        };

        match self.client.audio().speech(request).await {
            Ok(response) => {
                debug!(%role, bytes = response.bytes.len(), "Synthesized speech");
                Some(response.bytes.to_vec())
            }
            Err(e) => {
                warn!(%role, "Speech synthesis failed: {}", e);
                None
            }
        }
    }
}
