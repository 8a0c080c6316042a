use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{codes, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sessions/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    responses((status = 200, description = "Session event stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime session events to the caller, starting with a handshake.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let code = codes::normalize(&code)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    let receiver = sse_service::subscribe(&state, &code).await?;
    info!(%code, "new session SSE connection");

    let handshake = sse_service::handshake(&code, state.is_degraded().await);
    Ok(sse_service::to_sse_stream(code, handshake, receiver))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{code}/events", get(session_stream))
}
