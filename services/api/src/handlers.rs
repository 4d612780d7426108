//! Axum Handlers for the REST API
//!
//! This module contains the logic for running, browsing and exporting
//! simulated conversations. It uses `utoipa` doc comments to generate
//! OpenAPI documentation.

use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use consult_core::{
    LeadKind, RespondentKind, Turn,
    export::{DEFAULT_MESSAGES_PER_PAGE, ExportMetadata, render_json, render_markdown, render_text},
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    models::{
        CaseInfo, ConversationRecord, ConversationSummary, CreateConversationPayload,
        ErrorResponse, ExportFormat, ExportQuery, ListFilter, PersonaInfo, StoreStatistics,
    },
    simulation::{SimulationError, SimulationPlan},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Request problems map to 400; anything else is a server fault.
pub fn simulation_error(err: SimulationError) -> ApiError {
    match err {
        SimulationError::Orchestrator(e) => ApiError::InternalServerError(e.into()),
        other => ApiError::BadRequest(other.to_string()),
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Conversation with id '{}' not found", id))
}

/// Run a complete simulated visit and persist it.
#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationPayload,
    responses(
        (status = 201, description = "Conversation simulated and saved", body = ConversationRecord),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateConversationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    info!(lead = %payload.lead_type, respondent = %payload.respondent_type, "Creating conversation");
    let plan = SimulationPlan::from_payload(&payload, &state.config).map_err(simulation_error)?;
    let mut simulation = plan
        .prepare(
            state.generators.as_ref(),
            state.cases.as_ref(),
            state.policy.clone(),
        )
        .map_err(simulation_error)?;

    let produced = simulation.orchestrator.run_to_end().await?;
    let id = state.store.save(simulation.to_new_conversation()).await?;
    info!(%id, turns = produced, "Conversation saved");

    let record = state
        .store
        .load(id)
        .await?
        .ok_or_else(|| ApiError::InternalServerError(anyhow!("Conversation {id} vanished after save")))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List saved conversations, newest first.
#[utoipa::path(
    get,
    path = "/conversations",
    params(ListFilter),
    responses(
        (status = 200, description = "Conversation summaries", body = [ConversationSummary]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let summaries = state.store.list(&filter).await?;
    Ok(Json(summaries))
}

/// Get a saved conversation with its full transcript.
#[utoipa::path(
    get,
    path = "/conversations/{id}",
    responses(
        (status = 200, description = "Conversation details", body = ConversationRecord),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationRecord>, ApiError> {
    let record = state.store.load(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(record))
}

/// Delete a saved conversation.
#[utoipa::path(
    delete,
    path = "/conversations/{id}",
    responses(
        (status = 204, description = "Conversation deleted"),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    )
)]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(id).await? {
        info!(%id, "Conversation deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// Export a saved conversation as text, Markdown or JSON.
#[utoipa::path(
    get,
    path = "/conversations/{id}/export",
    responses(
        (status = 200, description = "Rendered transcript", body = String),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Conversation ID"),
        ExportQuery
    )
)]
pub async fn export_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let record = state.store.load(id).await?.ok_or_else(|| not_found(id))?;
    let turns: Vec<Turn> = record.messages.iter().map(Turn::from).collect();
    let meta = export_metadata(&record);
    let stem = format!("conversation_{}", record.summary.created_at.format("%Y%m%d_%H%M%S"));

    let (content_type, extension, body) = match query.format.unwrap_or_default() {
        ExportFormat::Text => ("text/plain; charset=utf-8", "txt", render_text(&turns, &meta)),
        ExportFormat::Markdown => (
            "text/markdown; charset=utf-8",
            "md",
            render_markdown(&turns, &meta, DEFAULT_MESSAGES_PER_PAGE),
        ),
        ExportFormat::Json => (
            "application/json",
            "json",
            serde_json::to_string_pretty(&render_json(&turns, &meta, &Utc::now().to_rfc3339()))?,
        ),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{stem}.{extension}\""),
            ),
        ],
        body,
    )
        .into_response())
}

fn export_metadata(record: &ConversationRecord) -> ExportMetadata {
    ExportMetadata {
        timestamp: Some(record.summary.created_at.to_rfc3339()),
        lead_name: record.statistics.lead_name.clone(),
        lead_type: record.summary.lead_type.clone(),
        lead_model: record.summary.lead_model.clone(),
        respondent_name: record.statistics.respondent_name.clone(),
        respondent_type: record.summary.respondent_type.clone(),
        respondent_model: record.summary.respondent_model.clone(),
        case_title: record.summary.case_title.clone(),
    }
}

/// Aggregate counts over saved conversations.
#[utoipa::path(
    get,
    path = "/statistics",
    responses(
        (status = 200, description = "Store statistics", body = StoreStatistics),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoreStatistics>, ApiError> {
    Ok(Json(state.store.statistics().await?))
}

/// List the built-in cases.
#[utoipa::path(
    get,
    path = "/cases",
    responses(
        (status = 200, description = "Available cases", body = [CaseInfo])
    )
)]
pub async fn list_cases(State(state): State<Arc<AppState>>) -> Json<Vec<CaseInfo>> {
    Json(
        state
            .cases
            .summaries()
            .into_iter()
            .map(|c| CaseInfo {
                case_id: c.case_id,
                title: c.title,
            })
            .collect(),
    )
}

/// List the built-in lead and respondent personas.
#[utoipa::path(
    get,
    path = "/personas",
    responses(
        (status = 200, description = "Available personas", body = [PersonaInfo])
    )
)]
pub async fn list_personas() -> Json<Vec<PersonaInfo>> {
    let leads = LeadKind::ALL.into_iter().map(LeadKind::persona);
    let respondents = RespondentKind::ALL.into_iter().map(RespondentKind::persona);
    Json(
        leads
            .chain(respondents)
            .map(|p| PersonaInfo {
                kind: p.kind().to_string(),
                name: p.name().to_string(),
                role: p.role().to_string(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use crate::{
        providers::tests::{StubFactory, test_config},
        router::create_router,
        state::AppState,
        store::{ConversationStore, MemoryStore, tests::new_conversation},
    };
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use consult_core::{TerminationPolicy, case_library::CaseLibrary};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = test_config();
        let state = Arc::new(AppState {
            store: store.clone(),
            generators: Arc::new(StubFactory {
                config: config.clone(),
            }),
            cases: Arc::new(CaseLibrary::default()),
            speech: None,
            policy: Arc::new(TerminationPolicy::default()),
            config: Arc::new(config),
        });
        (create_router(state), store)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn create_runs_and_persists_a_conversation() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/conversations",
                r#"{"lead_type":"liberal","respondent_type":"do-less","max_turns":2}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["lead_type"], "liberal");
        assert_eq!(json["total_turns"], 2);
        assert_eq!(json["messages"].as_array().unwrap().len(), 5);
        assert_eq!(json["messages"][0]["role"], "lead");
        assert_eq!(store.statistics().await.unwrap().total_conversations, 1);
    }

    #[tokio::test]
    async fn create_with_unconfigured_provider_is_bad_request() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/conversations",
                r#"{"lead_type":"liberal","respondent_type":"do-less","provider":"anthropic"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["message"].as_str().unwrap().contains("ANTHROPIC_API_KEY"));
        assert_eq!(store.statistics().await.unwrap().total_conversations, 0);
    }

    #[tokio::test]
    async fn oversized_budget_is_rejected_before_running() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/conversations",
                r#"{"lead_type":"liberal","respondent_type":"do-less","max_turns":1000000}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["message"].as_str().unwrap().contains("max_turns"));
        assert_eq!(store.statistics().await.unwrap().total_conversations, 0);
    }

    #[tokio::test]
    async fn unknown_case_is_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/conversations",
                r#"{"lead_type":"liberal","respondent_type":"do-less","case_id":"nope"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_and_delete_report_missing_conversations() {
        let (app, _) = app();
        let id = uuid::Uuid::new_v4();
        let response = app
            .clone()
            .oneshot(get(&format!("/conversations/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/conversations/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_filters_by_lead_type() {
        let (app, store) = app();
        store.save(new_conversation("liberal", "do-more")).await.unwrap();
        store.save(new_conversation("conservative", "do-more")).await.unwrap();

        let response = app
            .oneshot(get("/conversations?lead_type=conservative"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["lead_type"], "conservative");
    }

    #[tokio::test]
    async fn export_formats_set_content_type() {
        let (app, store) = app();
        let id = store.save(new_conversation("liberal", "do-more")).await.unwrap();

        for (format, content_type, needle) in [
            ("text", "text/plain; charset=utf-8", "[Message 1] Dr:"),
            ("markdown", "text/markdown; charset=utf-8", "# Medical Visit Simulation"),
            ("json", "application/json", "\"exported_at\""),
        ] {
            let response = app
                .clone()
                .oneshot(get(&format!("/conversations/{id}/export?format={format}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()["content-type"].to_str().unwrap(),
                content_type
            );
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = String::from_utf8(bytes.to_vec()).unwrap();
            assert!(body.contains(needle), "{format} export missing {needle}");
        }
    }

    #[tokio::test]
    async fn catalog_endpoints_list_builtins() {
        let (app, _) = app();
        let personas = body_json(app.clone().oneshot(get("/personas")).await.unwrap()).await;
        assert_eq!(personas.as_array().unwrap().len(), 4);
        assert_eq!(personas[0]["role"], "lead");
        assert_eq!(personas[3]["kind"], "do-less");

        let cases = body_json(app.oneshot(get("/cases")).await.unwrap()).await;
        assert_eq!(cases[0]["case_id"], "brca2_case");
    }
}
