//! Data Access Layer
//!
//! PostgreSQL implementation of [`ConversationStore`]. Queries are built at
//! runtime with `sqlx` so the crate builds without a live database; the
//! schema lives in `./migrations`.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    ConversationData, ConversationRecord, ConversationSummary, ListFilter, NewConversation,
    StoreStatistics,
};
use crate::store::{ConversationStore, StoreError};

const SUMMARY_COLUMNS: &str = "id, created_at, lead_type, respondent_type, lead_model, \
     respondent_model, case_id, case_title, total_turns";

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

#[derive(FromRow)]
struct ConversationRow {
    #[sqlx(flatten)]
    summary: ConversationSummary,
    conversation_data: Json<ConversationData>,
}

impl Db {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for Db {
    async fn save(&self, conversation: NewConversation) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let total_turns = conversation.total_turns();
        let data = Json(ConversationData {
            messages: conversation.messages,
            statistics: conversation.statistics,
        });

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, lead_type, respondent_type, lead_model, respondent_model,
                case_id, case_title, total_turns, conversation_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&conversation.lead_type)
        .bind(&conversation.respondent_type)
        .bind(&conversation.lead_model)
        .bind(&conversation.respondent_model)
        .bind(&conversation.case_id)
        .bind(&conversation.case_title)
        .bind(total_turns)
        .bind(data)
        .execute(&self.pool)
        .await?;

        debug!(%id, "Saved conversation");
        Ok(id)
    }

    async fn load(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {SUMMARY_COLUMNS}, conversation_data FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let Json(data) = row.conversation_data;
            ConversationRecord {
                summary: row.summary,
                messages: data.messages,
                statistics: data.statistics,
            }
        }))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SUMMARY_COLUMNS} FROM conversations WHERE 1=1"
        ));
        if let Some(lead_type) = &filter.lead_type {
            query.push(" AND lead_type = ").push_bind(lead_type.clone());
        }
        if let Some(respondent_type) = &filter.respondent_type {
            query
                .push(" AND respondent_type = ")
                .push_bind(respondent_type.clone());
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let summaries = query
            .build_query_as::<ConversationSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(summaries)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        let total_conversations = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        let by_lead_type = sqlx::query_as::<_, (String, i64)>(
            "SELECT lead_type, COUNT(*) FROM conversations GROUP BY lead_type",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();
        let by_respondent_type = sqlx::query_as::<_, (String, i64)>(
            "SELECT respondent_type, COUNT(*) FROM conversations GROUP BY respondent_type",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        Ok(StoreStatistics {
            total_conversations,
            by_lead_type,
            by_respondent_type,
        })
    }
}
