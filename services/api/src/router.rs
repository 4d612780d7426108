//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        CaseInfo, ConversationRecord, ConversationSummary, CreateConversationPayload,
        ErrorResponse, ExportFormat, MessageRecord, PersonaInfo, StoreStatistics,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_conversation,
        handlers::list_conversations,
        handlers::get_conversation,
        handlers::delete_conversation,
        handlers::export_conversation,
        handlers::get_statistics,
        handlers::list_cases,
        handlers::list_personas,
    ),
    components(
        schemas(ConversationSummary, ConversationRecord, MessageRecord, CreateConversationPayload, StoreStatistics, ExportFormat, PersonaInfo, CaseInfo, ErrorResponse)
    ),
    tags(
        (name = "Consult API", description = "Simulated oncology visits between a doctor and a patient persona")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route(
            "/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route(
            "/conversations/{id}",
            get(handlers::get_conversation).delete(handlers::delete_conversation),
        )
        .route(
            "/conversations/{id}/export",
            get(handlers::export_conversation),
        )
        .route("/statistics", get(handlers::get_statistics))
        .route("/cases", get(handlers::list_cases))
        .route("/personas", get(handlers::list_personas))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
