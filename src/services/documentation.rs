use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Hootline backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::join_session,
        crate::routes::session::set_quiz,
        crate::routes::session::start_session,
        crate::routes::session::advance_session,
        crate::routes::session::end_session,
        crate::routes::session::submit_answer,
        crate::routes::sse::session_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::SetQuizRequest,
            crate::dto::session::QuestionInput,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::AnswerOutcome,
            crate::dto::session::SessionSummary,
            crate::dto::session::PlayerSummary,
            crate::dto::session::LeaderboardRow,
            crate::dto::session::QuestionView,
            crate::dto::sse::Handshake,
            crate::dao::models::SessionState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session lifecycle and gameplay operations"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
