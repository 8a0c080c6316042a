use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::SharedState,
};

/// Subscribe to a session's event stream, verifying the code exists first so
/// clients cannot camp on channels for sessions that were never created.
pub async fn subscribe(
    state: &SharedState,
    code: &str,
) -> Result<broadcast::Receiver<ServerEvent>, ServiceError> {
    let store = state.require_session_store().await?;
    if store.get(code.to_owned()).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "session `{code}` not found"
        )));
    }

    Ok(state.session_events().subscribe(code))
}

/// Build the handshake event confirming a subscription.
pub fn handshake(code: &str, degraded: bool) -> ServerEvent {
    let payload = Handshake {
        code: code.to_owned(),
        message: "session stream connected".into(),
        degraded,
    };
    ServerEvent::json(Some("handshake".to_string()), &payload)
        .unwrap_or_else(|_| ServerEvent::new(Some("handshake".to_string()), "{}".to_string()))
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the channel closes or the client disconnects.
pub fn to_sse_stream(
    code: String,
    first: ServerEvent,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(to_event(first));

        loop {
            match receiver.recv().await {
                Ok(payload) => yield Ok(to_event(payload)),
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    // Skip lagged messages but keep the stream alive.
                    debug!(%code, skipped, "SSE subscriber lagged");
                    continue;
                }
            }
        }

        info!(%code, "session SSE stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
