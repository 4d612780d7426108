use std::fmt;
use std::net::SocketAddr;
use tracing::Level;

use consult_core::{Role, session::DEFAULT_MAX_EXCHANGES};

use crate::simulation::MAX_TURNS_RANGE;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Text generation backends reachable through an OpenAI-compatible endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::Gemini, Provider::Anthropic];

    /// Accepts the provider names plus the `google` and `claude` aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAI),
            "gemini" | "google" => Some(Provider::Gemini),
            "anthropic" | "claude" => Some(Provider::Anthropic),
            _ => None,
        }
    }

    /// Name used in model tags, e.g. `Gemini (gemini-2.5-flash)`.
    pub fn label(self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::Anthropic => "Claude",
        }
    }

    pub fn api_base(self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn key_var(self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o",
            Provider::Gemini => "gemini-2.5-flash",
            Provider::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
        };
        f.write_str(name)
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory conversation store.
    pub database_url: Option<String>,
    pub default_provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub lead_model: Option<String>,
    pub respondent_model: Option<String>,
    pub default_max_turns: usize,
    pub enable_tts: bool,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = non_empty_var("DATABASE_URL");

        let provider_str =
            std::env::var("DEFAULT_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let default_provider = Provider::parse(&provider_str).ok_or_else(|| {
            ConfigError::InvalidValue(
                "DEFAULT_PROVIDER".to_string(),
                format!("'{}' is not one of openai, gemini, anthropic", provider_str),
            )
        })?;

        let openai_api_key = non_empty_var("OPENAI_API_KEY");
        let gemini_api_key = non_empty_var("GEMINI_API_KEY");
        let anthropic_api_key = non_empty_var("ANTHROPIC_API_KEY");

        let lead_model = non_empty_var("LEAD_MODEL");
        let respondent_model = non_empty_var("RESPONDENT_MODEL");

        let default_max_turns = match std::env::var("DEFAULT_MAX_TURNS") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| MAX_TURNS_RANGE.contains(n))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "DEFAULT_MAX_TURNS".to_string(),
                        format!("'{}' is not an integer between 1 and 50", raw),
                    )
                })?,
            Err(_) => DEFAULT_MAX_EXCHANGES,
        };

        let enable_tts = std::env::var("ENABLE_TTS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let config = Self {
            bind_address,
            database_url,
            default_provider,
            openai_api_key,
            gemini_api_key,
            anthropic_api_key,
            lead_model,
            respondent_model,
            default_max_turns,
            enable_tts,
            log_level,
        };
        config.require_key(default_provider)?;
        Ok(config)
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }

    /// The key for `provider`, or the error reported when it is absent.
    pub fn require_key(&self, provider: Provider) -> Result<&str, ConfigError> {
        self.api_key(provider).ok_or_else(|| {
            ConfigError::MissingVar(format!(
                "{} must be set for '{}' provider",
                provider.key_var(),
                provider
            ))
        })
    }

    /// Configured model for `role`, falling back to the provider default.
    pub fn model_for(&self, provider: Provider, role: Role) -> String {
        let configured = match role {
            Role::Lead => self.lead_model.as_ref(),
            Role::Respondent => self.respondent_model.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
