//! Defines the WebSocket message protocol between the browser client and the API server.

use crate::models::CreateConversationPayload;
use consult_core::{ConversationStats, EndReason, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a live simulation. This must be the first message.
    Start(CreateConversationPayload),
    /// Holds the conversation after the turn in progress.
    Pause,
    Resume,
    /// Ends the conversation after the turn in progress and saves it.
    Stop,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the simulation is bound and running.
    Started {
        lead_name: String,
        respondent_name: String,
        lead_model: String,
        respondent_model: String,
        case_title: Option<String>,
    },
    /// A streamed piece of the turn being generated.
    TurnChunk {
        speaker: String,
        role: Role,
        text: String,
    },
    /// A finalized turn; `index` starts at 1.
    Turn {
        index: usize,
        speaker: String,
        role: Role,
        content: String,
        model: String,
    },
    /// Base64 MP3 for the turn with the same `index`.
    Audio {
        index: usize,
        role: Role,
        data: String,
    },
    Paused,
    Resumed,
    /// The conversation ended; `conversation_id` is set when it was saved.
    Finished {
        conversation_id: Option<Uuid>,
        reason: Option<EndReason>,
        stats: ConversationStats,
    },
    /// Reports a fatal error to the client.
    Error { message: String },
}
