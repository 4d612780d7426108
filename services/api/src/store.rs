//! Conversation persistence contract and its in-memory implementation.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    ConversationRecord, ConversationSummary, ListFilter, NewConversation, StoreStatistics,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Finished conversations, keyed by a store-assigned id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save(&self, conversation: NewConversation) -> Result<Uuid, StoreError>;
    async fn load(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError>;
    /// Summaries, newest first.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ConversationSummary>, StoreError>;
    /// True when a conversation was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn statistics(&self) -> Result<StoreStatistics, StoreError>;
}

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ConversationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn save(&self, conversation: NewConversation) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let total_turns = conversation.total_turns();
        let record = ConversationRecord {
            summary: ConversationSummary {
                id,
                created_at: Utc::now(),
                lead_type: conversation.lead_type,
                respondent_type: conversation.respondent_type,
                lead_model: conversation.lead_model,
                respondent_model: conversation.respondent_model,
                case_id: conversation.case_id,
                case_title: conversation.case_title,
                total_turns,
            },
            messages: conversation.messages,
            statistics: conversation.statistics,
        };
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn load(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.summary.id == id)
            .cloned())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<ConversationSummary>, StoreError> {
        let limit = usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX);
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .map(|r| &r.summary)
            .filter(|s| {
                filter
                    .lead_type
                    .as_ref()
                    .is_none_or(|t| &s.lead_type == t)
            })
            .filter(|s| {
                filter
                    .respondent_type
                    .as_ref()
                    .is_none_or(|t| &s.respondent_type == t)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.summary.id != id);
        Ok(records.len() != before)
    }

    async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        let records = self.records.read().await;
        let mut stats = StoreStatistics {
            total_conversations: i64::try_from(records.len()).unwrap_or(i64::MAX),
            ..StoreStatistics::default()
        };
        for record in records.iter() {
            *stats
                .by_lead_type
                .entry(record.summary.lead_type.clone())
                .or_default() += 1;
            *stats
                .by_respondent_type
                .entry(record.summary.respondent_type.clone())
                .or_default() += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::MessageRecord;
    use consult_core::{ConversationStats, Role, Turn};

    pub(crate) fn new_conversation(lead_type: &str, respondent_type: &str) -> NewConversation {
        NewConversation {
            lead_type: lead_type.into(),
            respondent_type: respondent_type.into(),
            lead_model: "OpenAI (gpt-4o)".into(),
            respondent_model: "OpenAI (gpt-4o)".into(),
            case_id: Some("brca2_case".into()),
            case_title: Some("BRCA2 Carrier".into()),
            messages: vec![
                MessageRecord::from(&Turn::new("Dr", Role::Lead, "Hello.", "OpenAI (gpt-4o)")),
                MessageRecord::from(&Turn::new("Pt", Role::Respondent, "Hi.", "OpenAI (gpt-4o)")),
            ],
            statistics: ConversationStats {
                total_turns: 2,
                lead_turns: 1,
                respondent_turns: 1,
                exchange_count: 0,
                lead_name: "Dr".into(),
                respondent_name: "Pt".into(),
                lead_model: "OpenAI (gpt-4o)".into(),
                respondent_model: "OpenAI (gpt-4o)".into(),
            },
        }
    }

    #[tokio::test]
    async fn save_then_load_reproduces_every_turn() {
        let store = MemoryStore::new();
        let source_turns = vec![
            Turn::new("Dr. Anderson", Role::Lead, "Your margins are clear.", "OpenAI (gpt-4o)"),
            Turn::new("Sarah", Role::Respondent, "Should I still consider radiation?", "Gemini (gemini-2.5-flash)"),
            Turn::new("Dr. Anderson", Role::Lead, "Let's weigh that together.", "OpenAI (gpt-4o)"),
        ];
        let original = NewConversation {
            messages: source_turns.iter().map(MessageRecord::from).collect(),
            ..new_conversation("conservative", "do-more")
        };

        let id = store.save(original.clone()).await.unwrap();
        let record = store.load(id).await.unwrap().unwrap();

        assert_eq!(record.messages, original.messages);
        assert_eq!(
            record.messages.iter().map(Turn::from).collect::<Vec<_>>(),
            source_turns
        );
        assert_eq!(record.statistics, original.statistics);
        assert_eq!(record.summary.total_turns, 1);
        assert_eq!(record.summary.case_title, original.case_title);
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let store = MemoryStore::new();
        let first = store.save(new_conversation("conservative", "do-more")).await.unwrap();
        let second = store.save(new_conversation("liberal", "do-more")).await.unwrap();
        let third = store.save(new_conversation("liberal", "do-less")).await.unwrap();

        let all = store.list(&ListFilter::default()).await.unwrap();
        assert_eq!(
            all.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![third, second, first]
        );

        let liberal = ListFilter {
            lead_type: Some("liberal".into()),
            ..ListFilter::default()
        };
        assert_eq!(store.list(&liberal).await.unwrap().len(), 2);

        let narrow = ListFilter {
            lead_type: Some("liberal".into()),
            respondent_type: Some("do-less".into()),
            limit: Some(5),
        };
        assert_eq!(store.list(&narrow).await.unwrap()[0].id, third);

        let one = ListFilter {
            limit: Some(1),
            ..ListFilter::default()
        };
        assert_eq!(store.list(&one).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let id = store.save(new_conversation("liberal", "do-less")).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn statistics_group_by_persona_type() {
        let store = MemoryStore::new();
        store.save(new_conversation("conservative", "do-more")).await.unwrap();
        store.save(new_conversation("liberal", "do-more")).await.unwrap();
        store.save(new_conversation("liberal", "do-less")).await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_conversations, 3);
        assert_eq!(stats.by_lead_type.get("liberal"), Some(&2));
        assert_eq!(stats.by_respondent_type.get("do-more"), Some(&2));
        assert_eq!(stats.by_respondent_type.get("do-less"), Some(&1));
    }
}
