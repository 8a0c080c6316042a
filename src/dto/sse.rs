use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::SessionState,
    dto::session::PlayerSummary,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across a session's SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event with a preserialized data payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Session code the stream is scoped to.
    pub code: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player enters the lobby.
pub struct PlayerJoinedEvent {
    pub player: PlayerSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the session moves through its lifecycle.
pub struct PhaseChangedEvent {
    pub code: String,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player's answer lands. Deliberately carries the answered
/// count only, never the chosen option.
pub struct AnswerReceivedEvent {
    pub player_id: Uuid,
    pub answered_count: usize,
}
