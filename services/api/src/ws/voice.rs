//! Background speech synthesis for finalized turns.

use super::protocol::ServerMessage;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use consult_core::{Turn, speech::SpeechSynthesizer};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

/// Synthesizes `turn` off the session loop. Nothing is sent when synthesis
/// yields no audio.
pub(super) fn spawn_speech(
    speech: Arc<dyn SpeechSynthesizer>,
    index: usize,
    turn: &Turn,
    audio_tx: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    let text = turn.content.clone();
    let role = turn.role;
    tokio::spawn(async move {
        let Some(bytes) = speech.synthesize(&text, role).await else {
            return;
        };
        debug!(index, bytes = bytes.len(), "Speech ready");
        let message = ServerMessage::Audio {
            index,
            role,
            data: STANDARD.encode(bytes),
        };
        let _ = audio_tx.send(message).await;
    })
}
