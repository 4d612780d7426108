//! Text generation contract and its OpenAI-compatible implementation.
//!
//! The orchestrator only ever sees [`TextGenerator`]. Implementations must not
//! fail for ordinary provider errors: they yield a bracketed in-band error
//! string instead, which the caller treats as ordinary reply text.

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tracing::{debug, warn};

/// A lazy, finite sequence of reply fragments, concatenating to the full reply.
pub type TextStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Chat role of a prior turn, relative to the persona being prompted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Everything a generator needs for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instructions: String,
    pub prior_turns: Vec<PriorTurn>,
    pub new_input: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Produces persona replies from a backing model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Display tag for the backing model, e.g. `OpenAI (gpt-4o)`.
    fn model_tag(&self) -> String;

    /// Streams the reply as incremental fragments.
    async fn stream(&self, request: GenerationRequest) -> TextStream;

    /// Returns the reply as one atomic string.
    async fn complete(&self, request: GenerationRequest) -> String;
}

/// Formats the in-band marker that stands in for a failed generation.
pub fn error_marker(model_tag: &str, detail: impl std::fmt::Display) -> String {
    format!("[Error: Error from {}: {}]", model_tag, detail)
}

/// True when `text` is an in-band generation failure.
pub fn is_error_marker(text: &str) -> bool {
    text.trim_start().starts_with("[Error:")
}

/// An implementation of `TextGenerator` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    provider_label: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the service.
    /// * `model` - Model identifier (e.g., "gpt-4o").
    /// * `provider_label` - Human-facing provider name used in the model tag.
    pub fn new(
        config: OpenAIConfig,
        model: impl Into<String>,
        provider_label: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            provider_label: provider_label.into(),
        }
    }

    fn build_request(
        &self,
        request: GenerationRequest,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(
            request.prior_turns.len() + 2,
        );
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_instructions)
                .build()?
                .into(),
        );
        for turn in request.prior_turns {
            match turn.role {
                ChatRole::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content)
                        .build()?
                        .into(),
                ),
                ChatRole::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content)
                        .build()?
                        .into(),
                ),
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.new_input)
                .build()?
                .into(),
        );

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens)
            .stream(stream)
            .build()
    }

    async fn try_complete(&self, request: GenerationRequest) -> Result<String, OpenAIError> {
        let request = self.build_request(request, false)?;
        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatibleClient {
    fn model_tag(&self) -> String {
        format!("{} ({})", self.provider_label, self.model)
    }

    async fn stream(&self, request: GenerationRequest) -> TextStream {
        let tag = self.model_tag();
        let request = match self.build_request(request, true) {
            Ok(request) => request,
            Err(e) => {
                warn!(model = %tag, error = %e, "Failed to build streaming request");
                return Box::pin(stream::once(async move { error_marker(&tag, e) }));
            }
        };

        let upstream = match self.client.chat().create_stream(request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(model = %tag, error = %e, "Streaming request failed");
                return Box::pin(stream::once(async move { error_marker(&tag, e) }));
            }
        };
        debug!(model = %tag, "Streaming reply");

        Box::pin(upstream.filter_map(move |result| {
            let tag = tag.clone();
            async move {
                match result {
                    Ok(response) => response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                        .filter(|content| !content.is_empty()),
                    Err(e) => {
                        warn!(model = %tag, error = %e, "Stream interrupted");
                        Some(error_marker(&tag, e))
                    }
                }
            }
        }))
    }

    async fn complete(&self, request: GenerationRequest) -> String {
        match self.try_complete(request).await {
            Ok(text) => text,
            Err(e) => {
                let tag = self.model_tag();
                warn!(model = %tag, error = %e, "Completion request failed");
                error_marker(&tag, e)
            }
        }
    }
}
