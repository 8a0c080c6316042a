use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::SessionEntity,
    dto::{
        session::{PlayerSummary, SessionSummary},
        sse::{AnswerReceivedEvent, PhaseChangedEvent, PlayerJoinedEvent, ServerEvent},
    },
    state::SharedState,
};

const EVENT_SESSION_UPDATED: &str = "session.updated";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_PHASE_CHANGED: &str = "phase.changed";
const EVENT_ANSWER_RECEIVED: &str = "answer.received";

/// Broadcast the full session view after a successful mutation.
pub fn broadcast_session_updated(state: &SharedState, summary: &SessionSummary) {
    send_session_event(state, &summary.code, EVENT_SESSION_UPDATED, summary);
}

/// Broadcast that a player entered the lobby.
pub fn broadcast_player_joined(state: &SharedState, code: &str, player: &PlayerSummary) {
    let payload = PlayerJoinedEvent {
        player: player.clone(),
    };
    send_session_event(state, code, EVENT_PLAYER_JOINED, &payload);
}

/// Broadcast a lifecycle change (start, advance, end).
pub fn broadcast_phase_changed(state: &SharedState, session: &SessionEntity) {
    let payload = PhaseChangedEvent {
        code: session.code.clone(),
        state: session.state,
        current_question: session.current_question,
    };
    send_session_event(state, &session.code, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast that an answer was recorded. Carries the answered count only;
/// the chosen option never leaves the store until the session ends.
pub fn broadcast_answer_received(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
    answered_count: usize,
) {
    let payload = AnswerReceivedEvent {
        player_id,
        answered_count,
    };
    send_session_event(state, code, EVENT_ANSWER_RECEIVED, &payload);
}

fn send_session_event<T: Serialize>(state: &SharedState, code: &str, event: &str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(server_event) => state.session_events().broadcast(code, server_event),
        Err(err) => warn!(%code, event, error = %err, "failed to serialize SSE payload"),
    }
}
