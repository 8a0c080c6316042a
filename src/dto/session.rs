use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::{QuestionEntity, SessionEntity, SessionState},
    dto::{
        format_system_time,
        validation::{validate_options, validate_quiz_source},
    },
    services::codes,
};

/// Payload used to open a fresh session lobby.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Lobby size cap. Omit for the configured default; 0 means unlimited.
    #[serde(default)]
    pub max_players: Option<usize>,
}

/// Response once a session code has been allocated.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Canonical code, as stored.
    pub code: String,
    /// Human-friendly `XXX-XXX` rendering of the same code.
    pub display_code: String,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

impl From<&SessionEntity> for CreateSessionResponse {
    fn from(entity: &SessionEntity) -> Self {
        Self {
            code: entity.code.clone(),
            display_code: codes::display(&entity.code),
            created_at: format_system_time(entity.created_at),
        }
    }
}

/// Payload for joining a waiting session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    /// Client-generated stable player id. Resending the same id makes the
    /// join idempotent across network retries.
    pub player_id: Uuid,
    /// Display name for the lobby.
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    /// Optional avatar reference.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Inline question supplied when setting a quiz by hand.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    /// Question prompt.
    #[validate(length(min = 1, max = 512))]
    pub text: String,
    /// Optional illustration reference.
    #[serde(default)]
    pub image: Option<String>,
    /// The four answer options, in display order.
    #[schema(value_type = Vec<String>)]
    pub options: [String; 4],
    /// Index of the correct option.
    #[validate(range(max = 3))]
    pub correct: u8,
}

impl From<QuestionInput> for QuestionEntity {
    fn from(value: QuestionInput) -> Self {
        Self {
            text: value.text,
            image: value.image,
            options: value.options,
            correct: value.correct,
        }
    }
}

/// Payload attaching a quiz to a waiting session, either inline or from an
/// external document URL.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetQuizRequest {
    /// URL of a quiz document to fetch.
    #[serde(default)]
    pub source: Option<String>,
    /// Inline questions.
    #[serde(default)]
    pub questions: Option<Vec<QuestionInput>>,
}

impl Validate for SetQuizRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match (&self.source, &self.questions) {
            (Some(_), Some(_)) | (None, None) => {
                let mut err = ValidationError::new("quiz_payload_choice");
                err.message = Some("Provide exactly one of `source` or `questions`".into());
                errors.add("source", err);
            }
            (Some(url), None) => {
                if let Err(err) = validate_quiz_source(url) {
                    errors.add("source", err);
                }
            }
            (None, Some(questions)) => {
                if questions.is_empty() {
                    let mut err = ValidationError::new("quiz_empty");
                    err.message = Some("A quiz needs at least one question".into());
                    errors.add("questions", err);
                }
                for question in questions {
                    if let Err(nested) = question.validate() {
                        errors.merge_self("questions", Err(nested));
                    }
                    if let Err(err) = validate_options(&question.options) {
                        errors.add("questions", err);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload for submitting an answer to the live question.
#[serde_as]
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Player submitting the answer.
    pub player_id: Uuid,
    /// Chosen option index.
    #[validate(range(max = 3))]
    pub option: u8,
    /// Time between question reveal and this submission, in milliseconds.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub elapsed_ms: Duration,
}

/// What a submission did to the player's standing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerOutcome {
    /// Player the outcome belongs to.
    pub player_id: Uuid,
    /// Whether the recorded option matches the correct one.
    pub correct: bool,
    /// Points this call added. Zero for misses and duplicates.
    pub points_awarded: u32,
    /// Cumulative score after this call.
    pub total_score: u32,
    /// Streak after this call.
    pub streak: u32,
    /// True when the player had already answered this question and the call
    /// changed nothing.
    pub duplicate: bool,
}

/// Public projection of a registered player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// One row of the live leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub player_id: Uuid,
    pub name: String,
    pub score: u32,
    pub streak: u32,
    /// Whether this player has answered the current question.
    pub answered: bool,
}

/// Projection of a question. The correct index is withheld while the session
/// is live and only revealed in the post-game view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub options: [String; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<u8>,
}

/// Read-only snapshot of a session, safe to hand to any subscriber.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Canonical session code.
    pub code: String,
    /// `XXX-XXX` rendering of the code.
    pub display_code: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// Cursor of the live question, while started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<usize>,
    /// Total number of questions in the quiz.
    pub question_count: usize,
    /// The live question, while started. Correct index withheld.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    /// Full quiz with correct indices; present only once ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionView>>,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
    /// Scores sorted best-first.
    pub leaderboard: Vec<LeaderboardRow>,
    /// How many players have answered the current question.
    pub answered_count: usize,
    /// Lobby size cap; 0 means unlimited.
    pub max_players: usize,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Last mutation timestamp, RFC 3339.
    pub updated_at: String,
}

impl From<&SessionEntity> for SessionSummary {
    fn from(entity: &SessionEntity) -> Self {
        let question = entity
            .live_question()
            .map(|(index, question)| QuestionView {
                index,
                text: question.text.clone(),
                image: question.image.clone(),
                options: question.options.clone(),
                correct: None,
            });

        let questions = (entity.state == SessionState::Ended).then(|| {
            entity
                .quiz
                .iter()
                .enumerate()
                .map(|(index, question)| QuestionView {
                    index,
                    text: question.text.clone(),
                    image: question.image.clone(),
                    options: question.options.clone(),
                    correct: Some(question.correct),
                })
                .collect()
        });

        let players = entity
            .players
            .iter()
            .map(|(id, player)| PlayerSummary {
                id: *id,
                name: player.name.clone(),
                avatar: player.avatar.clone(),
            })
            .collect();

        let mut leaderboard: Vec<LeaderboardRow> = entity
            .players
            .iter()
            .map(|(id, player)| LeaderboardRow {
                player_id: *id,
                name: player.name.clone(),
                score: entity.scores.get(id).copied().unwrap_or(0),
                streak: entity.streaks.get(id).copied().unwrap_or(0),
                answered: entity.answered.contains_key(id),
            })
            .collect();
        // Stable sort keeps join order among ties.
        leaderboard.sort_by(|a, b| b.score.cmp(&a.score));

        Self {
            code: entity.code.clone(),
            display_code: codes::display(&entity.code),
            state: entity.state,
            current_question: entity.current_question,
            question_count: entity.quiz.len(),
            question,
            questions,
            players,
            leaderboard,
            answered_count: entity.answered.len(),
            max_players: entity.max_players,
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{PlayerEntity, QuestionEntity};

    fn entity_with_players() -> SessionEntity {
        let mut entity = SessionEntity::new("AB12CD".into(), 0);
        entity.quiz = vec![QuestionEntity {
            text: "q".into(),
            image: None,
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct: 1,
        }];

        for (name, score) in [("amber", 300), ("billie", 1200), ("casey", 700)] {
            let id = Uuid::new_v4();
            entity.players.insert(
                id,
                PlayerEntity {
                    name: name.into(),
                    avatar: None,
                },
            );
            entity.scores.insert(id, score);
        }
        entity
    }

    #[test]
    fn leaderboard_is_sorted_best_first() {
        let summary = SessionSummary::from(&entity_with_players());
        let scores: Vec<u32> = summary.leaderboard.iter().map(|row| row.score).collect();
        assert_eq!(scores, vec![1200, 700, 300]);
        assert_eq!(summary.leaderboard[0].name, "billie");
    }

    #[test]
    fn correct_index_is_hidden_until_the_end() {
        let mut entity = entity_with_players();
        entity.state = SessionState::Started;
        entity.current_question = Some(0);

        let live = SessionSummary::from(&entity);
        assert_eq!(live.question.as_ref().unwrap().correct, None);
        assert!(live.questions.is_none());

        entity.state = SessionState::Ended;
        entity.current_question = None;
        let ended = SessionSummary::from(&entity);
        assert!(ended.question.is_none());
        assert_eq!(ended.questions.as_ref().unwrap()[0].correct, Some(1));
    }

    #[test]
    fn set_quiz_request_requires_exactly_one_payload() {
        let neither = SetQuizRequest {
            source: None,
            questions: None,
        };
        assert!(neither.validate().is_err());

        let both = SetQuizRequest {
            source: Some("https://example.org/q.json".into()),
            questions: Some(Vec::new()),
        };
        assert!(both.validate().is_err());

        let source_only = SetQuizRequest {
            source: Some("https://example.org/q.json".into()),
            questions: None,
        };
        assert!(source_only.validate().is_ok());
    }
}
