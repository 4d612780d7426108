//! API and Storage Models
//!
//! Records persisted by the conversation stores and the request/response
//! bodies of the REST API, annotated for `utoipa`.

use chrono::{DateTime, Utc};
use consult_core::{ConversationStats, Role, Turn};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Default page size for conversation listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// One stored utterance.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub speaker: String,
    #[schema(value_type = String, example = "lead")]
    pub role: Role,
    pub content: String,
    pub model: String,
}

impl From<&Turn> for MessageRecord {
    fn from(turn: &Turn) -> Self {
        Self {
            speaker: turn.speaker_name.clone(),
            role: turn.role,
            content: turn.content.clone(),
            model: turn.model_tag.clone(),
        }
    }
}

impl From<&MessageRecord> for Turn {
    fn from(record: &MessageRecord) -> Self {
        Turn::new(
            record.speaker.clone(),
            record.role,
            record.content.clone(),
            record.model.clone(),
        )
    }
}

/// A finished conversation about to be persisted.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub lead_type: String,
    pub respondent_type: String,
    pub lead_model: String,
    pub respondent_model: String,
    pub case_id: Option<String>,
    pub case_title: Option<String>,
    pub messages: Vec<MessageRecord>,
    pub statistics: ConversationStats,
}

impl NewConversation {
    /// Stored turn count: the number of respondent messages.
    pub fn total_turns(&self) -> i32 {
        let count = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Respondent)
            .count();
        i32::try_from(count).unwrap_or(i32::MAX)
    }
}

/// Transcript and statistics stored alongside the summary columns.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversationData {
    pub messages: Vec<MessageRecord>,
    pub statistics: ConversationStats,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[schema(example = "conservative")]
    pub lead_type: String,
    #[schema(example = "do-more")]
    pub respondent_type: String,
    pub lead_model: String,
    pub respondent_model: String,
    pub case_id: Option<String>,
    pub case_title: Option<String>,
    pub total_turns: i32,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ConversationRecord {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub messages: Vec<MessageRecord>,
    #[schema(value_type = Object)]
    pub statistics: ConversationStats,
}

#[derive(Deserialize, IntoParams, Debug, Clone, Default)]
#[into_params(parameter_in = Query)]
pub struct ListFilter {
    pub lead_type: Option<String>,
    pub respondent_type: Option<String>,
    /// Defaults to 50.
    pub limit: Option<i64>,
}

impl ListFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(0)
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default, PartialEq)]
pub struct StoreStatistics {
    pub total_conversations: i64,
    pub by_lead_type: BTreeMap<String, i64>,
    pub by_respondent_type: BTreeMap<String, i64>,
}

#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
pub struct CreateConversationPayload {
    #[schema(example = "conservative")]
    pub lead_type: String,
    #[schema(example = "do-more")]
    pub respondent_type: String,
    /// `openai`, `gemini` or `anthropic`; the configured default when omitted.
    #[schema(example = "openai")]
    pub provider: Option<String>,
    /// Provider for the lead only; falls back to `provider`.
    pub lead_provider: Option<String>,
    /// Provider for the respondent only; falls back to `provider`.
    pub respondent_provider: Option<String>,
    pub lead_model: Option<String>,
    pub respondent_model: Option<String>,
    /// Between 1 and 50.
    #[schema(example = 10)]
    pub max_turns: Option<usize>,
    /// Sampling temperature for both personas, 0.0 to 1.0.
    #[schema(example = 0.7)]
    pub temperature: Option<f32>,
    #[schema(example = "brca2_case")]
    pub case_id: Option<String>,
    /// Free-text case; takes precedence over `case_id`.
    pub custom_case: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    pub format: Option<ExportFormat>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct PersonaInfo {
    #[schema(example = "conservative")]
    pub kind: String,
    pub name: String,
    #[schema(example = "lead")]
    pub role: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct CaseInfo {
    pub case_id: String,
    pub title: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> ConversationStats {
        ConversationStats {
            total_turns: 3,
            lead_turns: 2,
            respondent_turns: 1,
            exchange_count: 1,
            lead_name: "Dr. Anderson (Conservative)".into(),
            respondent_name: "Sarah (Do-More Patient)".into(),
            lead_model: "OpenAI (gpt-4o)".into(),
            respondent_model: "OpenAI (gpt-4o)".into(),
        }
    }

    #[test]
    fn test_total_turns_counts_respondent_messages() {
        let messages = vec![
            MessageRecord::from(&Turn::new("Dr", Role::Lead, "Hello.", "m")),
            MessageRecord::from(&Turn::new("Pt", Role::Respondent, "Hi.", "m")),
            MessageRecord::from(&Turn::new("Dr", Role::Lead, "So.", "m")),
        ];
        let new = NewConversation {
            lead_type: "conservative".into(),
            respondent_type: "do-more".into(),
            lead_model: "m".into(),
            respondent_model: "m".into(),
            case_id: None,
            case_title: None,
            messages,
            statistics: stats(),
        };
        assert_eq!(new.total_turns(), 1);
    }

    #[test]
    fn test_turns_survive_record_conversion() {
        let turns = vec![
            Turn::new("Dr. Anderson (Conservative)", Role::Lead, "Your scan is clear.", "OpenAI (gpt-4o)"),
            Turn::new("Sarah (Do-More Patient)", Role::Respondent, "What about <trials>?", "Gemini (gemini-2.5-flash)"),
        ];
        let records: Vec<MessageRecord> = turns.iter().map(MessageRecord::from).collect();
        assert_eq!(records[1].speaker, "Sarah (Do-More Patient)");
        assert_eq!(records[1].model, "Gemini (gemini-2.5-flash)");
        assert_eq!(records.iter().map(Turn::from).collect::<Vec<_>>(), turns);
    }

    #[test]
    fn test_conversation_data_json_round_trip() {
        let data = ConversationData {
            messages: vec![
                MessageRecord::from(&Turn::new("Dr", Role::Lead, "Hello.\nHow are you?", "m1")),
                MessageRecord::from(&Turn::new("Pt", Role::Respondent, "Fine, \"mostly\".", "m2")),
            ],
            statistics: stats(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["messages"][1]["role"], "respondent");

        let back: ConversationData = serde_json::from_value(json).unwrap();
        assert_eq!(back.messages, data.messages);
        assert_eq!(back.statistics, data.statistics);
    }

    #[test]
    fn test_record_flattens_summary() {
        let record = ConversationRecord {
            summary: ConversationSummary {
                id: Uuid::nil(),
                created_at: Utc::now(),
                lead_type: "liberal".into(),
                respondent_type: "do-less".into(),
                lead_model: "m".into(),
                respondent_model: "m".into(),
                case_id: Some("brca2_case".into()),
                case_title: None,
                total_turns: 0,
            },
            messages: vec![],
            statistics: stats(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lead_type"], "liberal");
        assert_eq!(json["case_id"], "brca2_case");
        assert_eq!(json["statistics"]["lead_turns"], 2);
    }

    #[test]
    fn test_export_format_and_limit_defaults() {
        let query: ExportQuery = serde_json::from_str(r#"{"format":"markdown"}"#).unwrap();
        assert_eq!(query.format, Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::default(), ExportFormat::Text);
        assert!(serde_json::from_str::<ExportFormat>(r#""pdf""#).is_err());

        assert_eq!(ListFilter::default().effective_limit(), 50);
        let negative = ListFilter {
            limit: Some(-3),
            ..ListFilter::default()
        };
        assert_eq!(negative.effective_limit(), 0);
    }

    #[test]
    fn test_create_payload_requires_persona_types() {
        let ok: CreateConversationPayload =
            serde_json::from_str(r#"{"lead_type":"liberal","respondent_type":"do-less"}"#).unwrap();
        assert_eq!(ok.max_turns, None);
        assert!(serde_json::from_str::<CreateConversationPayload>(r#"{}"#).is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Conversation not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Conversation not found"}"#);
    }
}
