//! Manages the WebSocket connection lifecycle for a live simulation.

use super::{
    protocol::{ClientMessage, ServerMessage},
    voice::spawn_speech,
};
use crate::{
    simulation::{Simulation, SimulationPlan},
    state::AppState,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use consult_core::{OrchestratorError, SessionControl, Turn};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// The first client message must be `start`; it is resolved into a bound
/// simulation before any turn is produced. Configuration problems are
/// reported to the client and close the session.
#[instrument(name = "ws_session", skip_all, fields(connection_id = %Uuid::new_v4()))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut socket_tx, mut socket_rx) = socket.split();
    info!("New WebSocket connection. Awaiting start...");

    let prepared = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => start_simulation(&text, &state),
        Some(Ok(_)) => Err(anyhow!("First message was not a text `start` message.")),
        _ => {
            info!("Client disconnected before sending start message.");
            return;
        }
    };

    let simulation = match prepared {
        Ok(simulation) => simulation,
        Err(e) => {
            error!("Simulation start failed: {:?}", e);
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    if let Err(e) = run_live_session(state, socket_tx, socket_rx, simulation).await {
        error!(error = ?e, "Live session terminated with error.");
    }
    info!("Live session finished.");
}

fn start_simulation(start_text: &str, state: &AppState) -> Result<Simulation> {
    let msg: ClientMessage = serde_json::from_str(start_text)?;
    let ClientMessage::Start(payload) = msg else {
        return Err(anyhow!("First message must be `start`"));
    };
    let plan = SimulationPlan::from_payload(&payload, &state.config)?;
    Ok(plan.prepare(
        state.generators.as_ref(),
        state.cases.as_ref(),
        state.policy.clone(),
    )?)
}

/// Outbound half of the socket. Sends after a failure are dropped.
struct ClientLink {
    sink: SplitSink<WebSocket, Message>,
    open: bool,
}

impl ClientLink {
    async fn send(&mut self, msg: ServerMessage) {
        if !self.open {
            return;
        }
        if let Err(e) = send_msg(&mut self.sink, msg).await {
            warn!("Client unreachable: {:?}", e);
            self.open = false;
        }
    }
}

/// The event loop for a running simulation.
///
/// Turns are produced on a separate task so pause, resume and stop requests
/// are read while a generation call is in flight. A disconnected client is
/// treated as a stop; whatever was produced is still saved.
async fn run_live_session(
    state: Arc<AppState>,
    socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
    mut simulation: Simulation,
) -> Result<()> {
    let (fragment_tx, mut fragment_rx) = mpsc::unbounded_channel();
    simulation.orchestrator = simulation.orchestrator.with_fragment_sink(fragment_tx);
    let control = simulation.orchestrator.control().clone();
    let mut link = ClientLink {
        sink: socket_tx,
        open: true,
    };

    let meta = simulation.metadata();
    link.send(ServerMessage::Started {
        lead_name: meta.lead_name,
        respondent_name: meta.respondent_name,
        lead_model: meta.lead_model,
        respondent_model: meta.respondent_model,
        case_title: meta.case_title,
    })
    .await;

    let (turn_tx, mut turn_rx) = mpsc::channel(8);
    let (audio_tx, mut audio_rx) = mpsc::channel(8);
    let mut driver = tokio::spawn(drive(simulation, turn_tx).in_current_span());
    let mut speech_tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut index = 0usize;

    let joined = loop {
        tokio::select! {
            biased;
            Some(fragment) = fragment_rx.recv() => {
                link.send(ServerMessage::TurnChunk {
                    speaker: fragment.speaker_name,
                    role: fragment.role,
                    text: fragment.text,
                })
                .await;
            },
            Some(turn) = turn_rx.recv() => {
                index += 1;
                if let Some(speech) = &state.speech {
                    speech_tasks.push(spawn_speech(speech.clone(), index, &turn, audio_tx.clone()));
                }
                link.send(ServerMessage::Turn {
                    index,
                    speaker: turn.speaker_name,
                    role: turn.role,
                    content: turn.content,
                    model: turn.model_tag,
                })
                .await;
            },
            Some(audio) = audio_rx.recv() => link.send(audio).await,
            msg = socket_rx.next(), if link.open => match msg {
                Some(Ok(Message::Text(text))) => handle_client_text(&text, &control, &mut link).await,
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the connection. Stopping simulation.");
                    link.open = false;
                }
                Some(Err(e)) => {
                    error!("Error receiving from client WebSocket: {:?}", e);
                    link.open = false;
                }
                Some(Ok(_)) => {}
            },
            joined = &mut driver => break joined,
        }
        if !link.open {
            control.stop();
        }
    };

    let (simulation, outcome) = joined.context("Simulation task failed")?;

    drop(audio_tx);
    if !link.open {
        speech_tasks.iter().for_each(JoinHandle::abort);
    }
    while let Some(audio) = audio_rx.recv().await {
        link.send(audio).await;
    }

    if let Err(e) = outcome {
        link.send(ServerMessage::Error {
            message: e.to_string(),
        })
        .await;
        return Err(e.into());
    }

    let orchestrator = &simulation.orchestrator;
    let conversation_id = if orchestrator.session().transcript().is_empty() {
        None
    } else {
        match state.store.save(simulation.to_new_conversation()).await {
            Ok(id) => {
                info!(%id, "Live conversation saved");
                Some(id)
            }
            Err(e) => {
                link.send(ServerMessage::Error {
                    message: "The conversation could not be saved.".to_string(),
                })
                .await;
                return Err(e.into());
            }
        }
    };

    link.send(ServerMessage::Finished {
        conversation_id,
        reason: orchestrator.end_reason(),
        stats: orchestrator.stats(),
    })
    .await;
    if link.open {
        let _ = link.sink.close().await;
    }
    Ok(())
}

async fn handle_client_text(text: &str, control: &SessionControl, link: &mut ClientLink) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Pause) => {
            control.pause();
            info!("Paused by client.");
            link.send(ServerMessage::Paused).await;
        }
        Ok(ClientMessage::Resume) => {
            control.resume();
            info!("Resumed by client.");
            link.send(ServerMessage::Resumed).await;
        }
        Ok(ClientMessage::Stop) => {
            info!("Stop requested by client.");
            control.stop();
        }
        Ok(ClientMessage::Start(_)) => warn!("Ignoring `start` for a running simulation."),
        Err(e) => warn!("Ignoring malformed client message: {}", e),
    }
}

/// Produces turns until the conversation ends, honouring pause between turns.
async fn drive(
    mut simulation: Simulation,
    turns: mpsc::Sender<Turn>,
) -> (Simulation, Result<(), OrchestratorError>) {
    let control = simulation.orchestrator.control().clone();
    let outcome = loop {
        control.wait_until_runnable().await;
        match simulation.orchestrator.next_turn().await {
            Ok(Some(turn)) => {
                if turns.send(turn).await.is_err() {
                    control.stop();
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    (simulation, outcome)
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateConversationPayload;
    use crate::providers::tests::{StubFactory, test_config};
    use consult_core::{EndReason, Role, TerminationPolicy, case_library::CaseLibrary};
    use std::time::Duration;

    fn simulation(max_turns: usize) -> Simulation {
        let config = test_config();
        let payload = CreateConversationPayload {
            lead_type: "conservative".into(),
            respondent_type: "do-less".into(),
            max_turns: Some(max_turns),
            ..CreateConversationPayload::default()
        };
        SimulationPlan::from_payload(&payload, &config)
            .unwrap()
            .prepare(
                &StubFactory { config },
                &CaseLibrary::default(),
                Arc::new(TerminationPolicy::default()),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn driver_waits_while_paused() {
        let simulation = simulation(2);
        let control = simulation.orchestrator.control().clone();
        control.pause();

        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(drive(simulation, tx));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );

        control.resume();
        let (simulation, outcome) = handle.await.unwrap();
        outcome.unwrap();

        let mut roles = Vec::new();
        while let Some(turn) = rx.recv().await {
            roles.push(turn.role);
        }
        assert_eq!(
            roles,
            vec![
                Role::Lead,
                Role::Respondent,
                Role::Lead,
                Role::Respondent,
                Role::Lead
            ]
        );
        assert_eq!(
            simulation.orchestrator.end_reason(),
            Some(EndReason::TurnBudgetExhausted)
        );
    }

    #[tokio::test]
    async fn stopping_a_paused_driver_ends_without_turns() {
        let simulation = simulation(5);
        let control = simulation.orchestrator.control().clone();
        control.pause();
        control.stop();

        let (tx, mut rx) = mpsc::channel(8);
        let (simulation, outcome) = drive(simulation, tx).await;
        outcome.unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(
            simulation.orchestrator.end_reason(),
            Some(EndReason::StopRequested)
        );
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_driver() {
        let simulation = simulation(5);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let (simulation, outcome) = drive(simulation, tx).await;
        outcome.unwrap();
        assert_eq!(simulation.orchestrator.session().transcript().len(), 1);
        assert_eq!(
            simulation.orchestrator.end_reason(),
            Some(EndReason::StopRequested)
        );
    }
}
