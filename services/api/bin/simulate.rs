//! Terminal runner: one simulated visit, printed turn by turn.
//!
//! Provider keys and defaults come from the same environment as the API
//! service. `Ctrl+C` stops the conversation after the turn in progress.

use anyhow::{Context, Result, bail};
use clap::Parser;
use consult_api::{
    config::Config,
    db::Db,
    models::CreateConversationPayload,
    providers::ProviderRegistry,
    simulation::SimulationPlan,
    store::ConversationStore,
};
use consult_core::{TerminationPolicy, case_library::CaseLibrary};
use futures_util::StreamExt;
use sqlx::PgPool;
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simulate", version, about = "Run one simulated oncology visit")]
struct Cli {
    /// Lead persona: conservative or liberal
    #[arg(long, default_value = "conservative")]
    lead: String,

    /// Respondent persona: do-more or do-less
    #[arg(long, default_value = "do-more")]
    respondent: String,

    /// openai, gemini or anthropic, for both personas
    #[arg(long)]
    provider: Option<String>,

    /// Provider for the lead only
    #[arg(long)]
    lead_provider: Option<String>,

    /// Provider for the respondent only
    #[arg(long)]
    respondent_provider: Option<String>,

    /// Model for both personas unless overridden below
    #[arg(short, long)]
    model: Option<String>,

    #[arg(long)]
    lead_model: Option<String>,

    #[arg(long)]
    respondent_model: Option<String>,

    /// Exchange budget after the opening
    #[arg(short = 'n', long)]
    max_turns: Option<usize>,

    /// Sampling temperature for both personas (0.0 to 1.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Built-in case id
    #[arg(long)]
    case: Option<String>,

    /// Free-text case description
    #[arg(long, conflicts_with = "case")]
    custom_case: Option<String>,

    /// Save the finished conversation to DATABASE_URL
    #[arg(long)]
    save: bool,

    /// Write the plain-text transcript here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);
    if cli.save && config.database_url.is_none() {
        bail!("--save requires DATABASE_URL to be set");
    }

    let payload = CreateConversationPayload {
        lead_type: cli.lead,
        respondent_type: cli.respondent,
        provider: cli.provider,
        lead_provider: cli.lead_provider,
        respondent_provider: cli.respondent_provider,
        lead_model: cli.lead_model.or_else(|| cli.model.clone()),
        respondent_model: cli.respondent_model.or(cli.model),
        max_turns: cli.max_turns,
        temperature: cli.temperature,
        case_id: cli.case,
        custom_case: cli.custom_case,
    };
    let plan = SimulationPlan::from_payload(&payload, &config)?;
    let mut simulation = plan.prepare(
        &ProviderRegistry::new(config.clone()),
        &CaseLibrary::default(),
        Arc::new(TerminationPolicy::default()),
    )?;

    let control = simulation.orchestrator.control().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current turn...");
            control.stop();
        }
    });

    if let Some(title) = simulation.case_title() {
        println!("Case: {title}\n");
    }

    {
        let turns = simulation.orchestrator.turns();
        tokio::pin!(turns);
        while let Some(turn) = turns.next().await {
            let turn = turn?;
            println!(
                "{} ({}) [{}]\n{}\n",
                turn.speaker_name, turn.role, turn.model_tag, turn.content
            );
        }
    }

    let stats = simulation.orchestrator.stats();
    println!(
        "--- {} turns, {} exchanges, ended: {:?}",
        stats.total_turns,
        stats.exchange_count,
        simulation.orchestrator.end_reason()
    );

    if let Some(path) = &cli.output {
        let text = consult_core::export::render_text(
            simulation.orchestrator.session().transcript().turns(),
            &simulation.metadata(),
        );
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Transcript written");
    }

    if let Some(database_url) = config.database_url.as_deref().filter(|_| cli.save) {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        let db = Db::new(pool);
        db.run_migrations().await?;
        let id = db.save(simulation.to_new_conversation()).await?;
        println!("Saved conversation {id}");
    }

    Ok(())
}
