use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::session::{
        AnswerOutcome, CreateSessionRequest, CreateSessionResponse, JoinSessionRequest,
        SessionSummary, SetQuizRequest, SubmitAnswerRequest,
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes driving the session lifecycle, from lobby to leaderboard.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session))
        .route("/sessions/{code}/players", post(join_session))
        .route("/sessions/{code}/quiz", put(set_quiz))
        .route("/sessions/{code}/start", post(start_session))
        .route("/sessions/{code}/advance", post(advance_session))
        .route("/sessions/{code}/end", post(end_session))
        .route("/sessions/{code}/answers", post(submit_answer))
}

/// Allocate a unique code and open a fresh session lobby.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let response = session_service::create_session(&state, payload).await?;
    Ok(Json(response))
}

/// Fetch a read-only snapshot of a session.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSummary)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::get_session(&state, &code).await?;
    Ok(Json(summary))
}

/// Join a waiting session lobby.
#[utoipa::path(
    post,
    path = "/sessions/{code}/players",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Joined (or already joined)", body = SessionSummary)
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::join_session(&state, &code, payload).await?;
    Ok(Json(summary))
}

/// Attach a quiz to a waiting session, inline or fetched from a URL.
#[utoipa::path(
    put,
    path = "/sessions/{code}/quiz",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    request_body = SetQuizRequest,
    responses(
        (status = 200, description = "Quiz attached", body = SessionSummary)
    )
)]
pub async fn set_quiz(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SetQuizRequest>>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::set_quiz(&state, &code, payload).await?;
    Ok(Json(summary))
}

/// Open the first question.
#[utoipa::path(
    post,
    path = "/sessions/{code}/start",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    responses(
        (status = 200, description = "Session started", body = SessionSummary)
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::start_session(&state, &code).await?;
    Ok(Json(summary))
}

/// Move to the next question, ending the session after the last one.
#[utoipa::path(
    post,
    path = "/sessions/{code}/advance",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    responses(
        (status = 200, description = "Cursor advanced or session ended", body = SessionSummary)
    )
)]
pub async fn advance_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::advance_session(&state, &code).await?;
    Ok(Json(summary))
}

/// Terminate the session regardless of remaining questions.
#[utoipa::path(
    post,
    path = "/sessions/{code}/end",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    responses(
        (status = 200, description = "Session ended", body = SessionSummary)
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::end_session(&state, &code).await?;
    Ok(Json(summary))
}

/// Submit an answer to the live question.
#[utoipa::path(
    post,
    path = "/sessions/{code}/answers",
    tag = "session",
    params(("code" = String, Path, description = "Session code, canonical or display form")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded (or absorbed as a duplicate)", body = AnswerOutcome)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<AnswerOutcome>, AppError> {
    let outcome = session_service::submit_answer(&state, &code, payload).await?;
    Ok(Json(outcome))
}
