//! Main Entrypoint for the Consult API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Choosing the conversation store (PostgreSQL when configured, memory otherwise).
//! 3. Initializing shared services (provider bindings, cases, speech).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use consult_api::{
    config::Config,
    db::Db,
    providers::{ProviderRegistry, speech_synthesizer},
    router::create_router,
    state::AppState,
    store::{ConversationStore, MemoryStore},
};
use consult_core::{TerminationPolicy, case_library::CaseLibrary};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ConversationStore>> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL is not set; conversations are kept in memory only.");
        return Ok(Arc::new(MemoryStore::new()));
    };
    let pool = PgPool::connect(database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Db::new(pool);
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");
    Ok(Arc::new(db))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 2. Conversation Store ---
    let store = open_store(&config).await?;

    // --- 3. Shared Services ---
    let app_state = Arc::new(AppState {
        store,
        generators: Arc::new(ProviderRegistry::new(config.clone())),
        cases: Arc::new(CaseLibrary::default()),
        speech: speech_synthesizer(&config),
        policy: Arc::new(TerminationPolicy::default()),
        config: config.clone(),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = %config.default_provider,
        max_turns = config.default_max_turns,
        tts = config.enable_tts,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
