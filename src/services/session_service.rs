//! Session coordination. Every mutating operation here is expressed as one
//! conditional update against the session store, so concurrent callers on the
//! same code are serialized by revision rather than by luck: submissions for
//! different players merge, duplicates for the same player collapse into
//! no-ops, and nothing is ever half-written.

use tracing::info;

use crate::{
    dao::{
        models::{PlayerEntity, QuestionEntity, SessionState},
        session_store::{TransactError, TxDecision, transact},
    },
    dto::session::{
        AnswerOutcome, CreateSessionRequest, CreateSessionResponse, JoinSessionRequest,
        PlayerSummary, SessionSummary, SetQuizRequest, SubmitAnswerRequest,
    },
    error::ServiceError,
    services::{codes, quiz_service, scoring, sse_events},
    state::{
        SharedState,
        machine::{self, SessionEvent, Transition},
    },
};

/// Allocate a unique code and open a fresh lobby.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<CreateSessionResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let max_players = request
        .max_players
        .unwrap_or_else(|| state.config().default_max_players());

    let entity = codes::allocate(&store, max_players, state.config().code_attempts()).await?;
    info!(code = %entity.code, max_players, "session created");

    Ok(CreateSessionResponse::from(&entity))
}

/// Read-only snapshot of a session.
pub async fn get_session(
    state: &SharedState,
    code_input: &str,
) -> Result<SessionSummary, ServiceError> {
    let code = codes::normalize(code_input)?;
    let store = state.require_session_store().await?;

    let Some((entity, _)) = store.get(code.clone()).await? else {
        return Err(not_found(&code));
    };

    Ok(SessionSummary::from(&entity))
}

/// Register a player in a waiting lobby.
///
/// Re-sending the same player id is a no-op, so clients can retry joins
/// safely. Late joins against a started or ended session are rejected; there
/// is no spectator path.
pub async fn join_session(
    state: &SharedState,
    code_input: &str,
    request: JoinSessionRequest,
) -> Result<SessionSummary, ServiceError> {
    let code = codes::normalize(code_input)?;
    let store = state.require_session_store().await?;

    let (joined, entity) = transact(&store, &code, state.config().retry(), |session| {
        if session.state != SessionState::Waiting {
            return Err(ServiceError::NotAccepting(
                "session has already started".into(),
            ));
        }

        if session.players.contains_key(&request.player_id) {
            return Ok(TxDecision::Skip(None));
        }

        if session.max_players > 0 && session.players.len() >= session.max_players {
            return Err(ServiceError::NotAccepting("session lobby is full".into()));
        }

        session.players.insert(
            request.player_id,
            PlayerEntity {
                name: request.name.clone(),
                avatar: request.avatar.clone(),
            },
        );

        Ok(TxDecision::Commit(Some(PlayerSummary {
            id: request.player_id,
            name: request.name.clone(),
            avatar: request.avatar.clone(),
        })))
    })
    .await
    .map_err(|err| map_tx(&code, err))?;

    let summary = SessionSummary::from(&entity);
    if let Some(player) = joined {
        info!(%code, player_id = %player.id, "player joined");
        sse_events::broadcast_player_joined(state, &code, &player);
        sse_events::broadcast_session_updated(state, &summary);
    }

    Ok(summary)
}

/// Attach a quiz to a waiting session, fetching it from the content source
/// when a URL is given.
pub async fn set_quiz(
    state: &SharedState,
    code_input: &str,
    request: SetQuizRequest,
) -> Result<SessionSummary, ServiceError> {
    let code = codes::normalize(code_input)?;

    // Resolve content before opening the transaction; a store update must
    // never wait on an external fetch.
    let questions: Vec<QuestionEntity> = match (request.source, request.questions) {
        (Some(url), None) => quiz_service::fetch_quiz(&url).await?,
        (None, Some(inline)) => inline.into_iter().map(QuestionEntity::from).collect(),
        _ => {
            return Err(ServiceError::InvalidInput(
                "provide exactly one of `source` or `questions`".into(),
            ));
        }
    };

    let store = state.require_session_store().await?;
    let (_, entity) = transact(&store, &code, state.config().retry(), |session| {
        if session.state != SessionState::Waiting {
            return Err(ServiceError::IllegalTransition(
                "quiz can only be set while the session is waiting".into(),
            ));
        }

        session.quiz = questions.clone();
        Ok(TxDecision::Commit(()))
    })
    .await
    .map_err(|err| map_tx(&code, err))?;

    info!(%code, questions = entity.quiz.len(), "quiz set");
    let summary = SessionSummary::from(&entity);
    sse_events::broadcast_session_updated(state, &summary);

    Ok(summary)
}

/// Open the first question (Waiting → Started).
pub async fn start_session(
    state: &SharedState,
    code_input: &str,
) -> Result<SessionSummary, ServiceError> {
    drive(state, code_input, SessionEvent::Start).await
}

/// Move to the next question, ending the session when none remain.
pub async fn advance_session(
    state: &SharedState,
    code_input: &str,
) -> Result<SessionSummary, ServiceError> {
    drive(state, code_input, SessionEvent::Advance).await
}

/// Terminate the session regardless of remaining questions.
pub async fn end_session(
    state: &SharedState,
    code_input: &str,
) -> Result<SessionSummary, ServiceError> {
    drive(state, code_input, SessionEvent::End).await
}

/// Record and score an answer for the live question.
///
/// The duplicate check and the score mutation live in the same transaction
/// closure: a player who already answered gets a no-op, never a second award,
/// even when both submissions race.
pub async fn submit_answer(
    state: &SharedState,
    code_input: &str,
    request: SubmitAnswerRequest,
) -> Result<AnswerOutcome, ServiceError> {
    let code = codes::normalize(code_input)?;
    let store = state.require_session_store().await?;
    let tuning = state.config().scoring().clone();

    let (outcome, entity) = transact(&store, &code, state.config().retry(), |session| {
        if session.state != SessionState::Started {
            return Err(ServiceError::NotAccepting(
                "session is not accepting answers".into(),
            ));
        }
        if !session.players.contains_key(&request.player_id) {
            return Err(ServiceError::NotFound(format!(
                "player `{}` is not part of session `{code}`",
                request.player_id
            )));
        }
        let Some((_, question)) = session.live_question() else {
            return Err(ServiceError::NotAccepting("no question is live".into()));
        };
        let correct_option = question.correct;

        if let Some(recorded) = session.answered.get(&request.player_id) {
            return Ok(TxDecision::Skip(AnswerOutcome {
                player_id: request.player_id,
                correct: *recorded == correct_option,
                points_awarded: 0,
                total_score: session.scores.get(&request.player_id).copied().unwrap_or(0),
                streak: session.streaks.get(&request.player_id).copied().unwrap_or(0),
                duplicate: true,
            }));
        }

        let correct = request.option == correct_option;
        let prior_streak = session.streaks.get(&request.player_id).copied().unwrap_or(0);
        let scored = scoring::score(&tuning, correct, request.elapsed_ms, prior_streak);

        let total = session.scores.entry(request.player_id).or_insert(0);
        *total += scored.points;
        let total_score = *total;
        session.streaks.insert(request.player_id, scored.streak);
        session.answered.insert(request.player_id, request.option);

        Ok(TxDecision::Commit(AnswerOutcome {
            player_id: request.player_id,
            correct,
            points_awarded: scored.points,
            total_score,
            streak: scored.streak,
            duplicate: false,
        }))
    })
    .await
    .map_err(|err| map_tx(&code, err))?;

    if !outcome.duplicate {
        sse_events::broadcast_answer_received(
            state,
            &code,
            outcome.player_id,
            entity.answered.len(),
        );
        sse_events::broadcast_session_updated(state, &SessionSummary::from(&entity));
    }

    Ok(outcome)
}

/// Run a lifecycle event through the state machine inside a transaction and
/// broadcast the result.
async fn drive(
    state: &SharedState,
    code_input: &str,
    event: SessionEvent,
) -> Result<SessionSummary, ServiceError> {
    let code = codes::normalize(code_input)?;
    let store = state.require_session_store().await?;

    let (transition, entity) = transact(&store, &code, state.config().retry(), |session| {
        let transition = machine::plan(session, event).map_err(ServiceError::from)?;
        if transition == Transition::Stay {
            return Ok(TxDecision::Skip(transition));
        }
        machine::apply(session, transition);
        Ok(TxDecision::Commit(transition))
    })
    .await
    .map_err(|err| map_tx(&code, err))?;

    let summary = SessionSummary::from(&entity);
    if transition != Transition::Stay {
        info!(%code, ?event, state = ?entity.state, cursor = ?entity.current_question, "session transitioned");
        sse_events::broadcast_phase_changed(state, &entity);
        sse_events::broadcast_session_updated(state, &summary);
    }

    Ok(summary)
}

fn not_found(code: &str) -> ServiceError {
    ServiceError::NotFound(format!("session `{code}` not found"))
}

fn map_tx(code: &str, err: TransactError<ServiceError>) -> ServiceError {
    match err {
        TransactError::NotFound => not_found(code),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::MemorySessionStore,
        dto::session::QuestionInput,
        state::AppState,
    };

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        state
    }

    fn inline_quiz(count: usize) -> SetQuizRequest {
        let questions = (0..count)
            .map(|i| QuestionInput {
                text: format!("question {i}"),
                image: None,
                options: [
                    "red".into(),
                    "green".into(),
                    "blue".into(),
                    "yellow".into(),
                ],
                correct: 1,
            })
            .collect();

        SetQuizRequest {
            source: None,
            questions: Some(questions),
        }
    }

    fn join_request(name: &str) -> JoinSessionRequest {
        JoinSessionRequest {
            player_id: Uuid::new_v4(),
            name: name.into(),
            avatar: None,
        }
    }

    fn answer(player_id: Uuid, option: u8) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            player_id,
            option,
            elapsed_ms: Duration::ZERO,
        }
    }

    async fn started_session(state: &SharedState, questions: usize, players: &[Uuid]) -> String {
        let created = create_session(state, CreateSessionRequest::default())
            .await
            .unwrap();
        set_quiz(state, &created.code, inline_quiz(questions))
            .await
            .unwrap();
        for (i, player_id) in players.iter().enumerate() {
            join_session(
                state,
                &created.code,
                JoinSessionRequest {
                    player_id: *player_id,
                    name: format!("player {i}"),
                    avatar: None,
                },
            )
            .await
            .unwrap();
        }
        start_session(state, &created.code).await.unwrap();
        created.code
    }

    #[tokio::test]
    async fn created_sessions_are_retrievable_by_display_form() {
        let state = test_state().await;
        let created = create_session(&state, CreateSessionRequest::default())
            .await
            .unwrap();

        let summary = get_session(&state, &created.display_code.to_lowercase())
            .await
            .unwrap();

        assert_eq!(summary.code, created.code);
        assert_eq!(summary.state, SessionState::Waiting);
        assert!(summary.players.is_empty());
    }

    #[tokio::test]
    async fn unknown_codes_are_not_found() {
        let state = test_state().await;
        let err = get_session(&state, "ZZZZZZ").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn join_is_idempotent_per_player_id() {
        let state = test_state().await;
        let created = create_session(&state, CreateSessionRequest::default())
            .await
            .unwrap();
        let request = join_request("robin");

        let first = join_session(
            &state,
            &created.code,
            JoinSessionRequest {
                player_id: request.player_id,
                name: request.name.clone(),
                avatar: None,
            },
        )
        .await
        .unwrap();
        let second = join_session(&state, &created.code, request).await.unwrap();

        assert_eq!(first.players.len(), 1);
        assert_eq!(second.players.len(), 1);
    }

    #[tokio::test]
    async fn late_joiners_are_rejected_and_roster_is_unchanged() {
        let state = test_state().await;
        let player = Uuid::new_v4();
        let code = started_session(&state, 1, &[player]).await;

        let err = join_session(&state, &code, join_request("late"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotAccepting(_)));
        let summary = get_session(&state, &code).await.unwrap();
        assert_eq!(summary.players.len(), 1);
    }

    #[tokio::test]
    async fn full_lobbies_reject_new_players() {
        let state = test_state().await;
        let created = create_session(
            &state,
            CreateSessionRequest {
                max_players: Some(1),
            },
        )
        .await
        .unwrap();

        join_session(&state, &created.code, join_request("solo"))
            .await
            .unwrap();
        let err = join_session(&state, &created.code, join_request("extra"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotAccepting(_)));
    }

    #[tokio::test]
    async fn quiz_cannot_change_after_start() {
        let state = test_state().await;
        let code = started_session(&state, 1, &[Uuid::new_v4()]).await;

        let err = set_quiz(&state, &code, inline_quiz(2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn starting_without_a_quiz_is_illegal() {
        let state = test_state().await;
        let created = create_session(&state, CreateSessionRequest::default())
            .await
            .unwrap();

        let err = start_session(&state, &created.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn advancing_through_every_question_ends_the_session() {
        let state = test_state().await;
        let code = started_session(&state, 3, &[Uuid::new_v4()]).await;

        for expected in [Some(1), Some(2), None] {
            let summary = advance_session(&state, &code).await.unwrap();
            assert_eq!(summary.current_question, expected);
        }

        let summary = get_session(&state, &code).await.unwrap();
        assert_eq!(summary.state, SessionState::Ended);

        // Duplicate advance deliveries against an ended session are no-ops.
        let summary = advance_session(&state, &code).await.unwrap();
        assert_eq!(summary.state, SessionState::Ended);
    }

    #[tokio::test]
    async fn ending_a_waiting_lobby_is_allowed() {
        let state = test_state().await;
        let created = create_session(&state, CreateSessionRequest::default())
            .await
            .unwrap();

        let summary = end_session(&state, &created.code).await.unwrap();
        assert_eq!(summary.state, SessionState::Ended);
    }

    #[tokio::test]
    async fn correct_answers_award_points_and_build_streaks() {
        let state = test_state().await;
        let player = Uuid::new_v4();
        let code = started_session(&state, 2, &[player]).await;

        let outcome = submit_answer(&state, &code, answer(player, 1)).await.unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.points_awarded, 1600);
        assert_eq!(outcome.streak, 1);

        advance_session(&state, &code).await.unwrap();

        let outcome = submit_answer(&state, &code, answer(player, 1)).await.unwrap();
        assert_eq!(outcome.streak, 2);
        assert_eq!(outcome.total_score, 1600 + 1700);
    }

    #[tokio::test]
    async fn wrong_answers_score_nothing_and_reset_the_streak() {
        let state = test_state().await;
        let player = Uuid::new_v4();
        let code = started_session(&state, 2, &[player]).await;

        submit_answer(&state, &code, answer(player, 1)).await.unwrap();
        advance_session(&state, &code).await.unwrap();

        let outcome = submit_answer(&state, &code, answer(player, 0)).await.unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.points_awarded, 0);
        assert_eq!(outcome.streak, 0);
        assert_eq!(outcome.total_score, 1600);
    }

    #[tokio::test]
    async fn duplicate_submissions_never_double_score() {
        let state = test_state().await;
        let player = Uuid::new_v4();
        let code = started_session(&state, 1, &[player]).await;

        let first = submit_answer(&state, &code, answer(player, 1)).await.unwrap();
        let second = submit_answer(&state, &code, answer(player, 1)).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(second.points_awarded, 0);
        assert_eq!(second.total_score, first.total_score);

        // A different option from the same player is also absorbed.
        let third = submit_answer(&state, &code, answer(player, 0)).await.unwrap();
        assert!(third.duplicate);
        assert_eq!(third.total_score, first.total_score);
    }

    #[tokio::test]
    async fn submissions_outside_a_live_question_are_rejected() {
        let state = test_state().await;
        let player = Uuid::new_v4();
        let created = create_session(&state, CreateSessionRequest::default())
            .await
            .unwrap();
        set_quiz(&state, &created.code, inline_quiz(1)).await.unwrap();
        join_session(
            &state,
            &created.code,
            JoinSessionRequest {
                player_id: player,
                name: "early".into(),
                avatar: None,
            },
        )
        .await
        .unwrap();

        let err = submit_answer(&state, &created.code, answer(player, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotAccepting(_)));
    }

    #[tokio::test]
    async fn unknown_players_cannot_submit() {
        let state = test_state().await;
        let code = started_session(&state, 1, &[Uuid::new_v4()]).await;

        let err = submit_answer(&state, &code, answer(Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_submissions_for_different_players_all_land() {
        let state = test_state().await;
        let players: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let code = started_session(&state, 1, &players).await;

        let mut handles = Vec::new();
        for player in &players {
            let state = state.clone();
            let code = code.clone();
            let player = *player;
            handles.push(tokio::spawn(async move {
                submit_answer(&state, &code, answer(player, 1)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = get_session(&state, &code).await.unwrap();
        assert_eq!(summary.answered_count, players.len());
        for row in &summary.leaderboard {
            assert_eq!(row.score, 1600, "lost update for {}", row.player_id);
        }
    }

    #[tokio::test]
    async fn concurrent_duplicate_submissions_score_once() {
        let state = test_state().await;
        let player = Uuid::new_v4();
        let code = started_session(&state, 1, &[player]).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            let code = code.clone();
            handles.push(tokio::spawn(async move {
                submit_answer(&state, &code, answer(player, 1)).await
            }));
        }

        let mut scored = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if !outcome.duplicate {
                scored += 1;
            }
        }

        assert_eq!(scored, 1);
        let summary = get_session(&state, &code).await.unwrap();
        assert_eq!(summary.leaderboard[0].score, 1600);
    }
}
