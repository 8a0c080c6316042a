use std::{collections::HashMap, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle states a quiz session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Lobby is open, players can join and the quiz can be set.
    Waiting,
    /// A question is live and answers are accepted.
    Started,
    /// The session is over; scores are frozen.
    Ended,
}

/// One question of a quiz: a prompt, four options, and the correct index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question prompt shown to players.
    pub text: String,
    /// Optional illustration reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// The four answer options, in display order.
    pub options: [String; 4],
    /// Index (0..=3) of the correct option.
    pub correct: u8,
}

/// A participant registered in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Display name chosen at join time.
    pub name: String,
    /// Optional avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Aggregate session document persisted by the storage layer, keyed by code.
///
/// All gameplay mutations rewrite this document atomically through a
/// compare-and-swap on its storage revision; the struct itself carries no
/// synchronisation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Canonical 6-character uppercase alphanumeric join code.
    pub code: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Index of the live question; `Some` only while [`SessionState::Started`].
    pub current_question: Option<usize>,
    /// Ordered questions for this session; fixed once the session starts.
    pub quiz: Vec<QuestionEntity>,
    /// Players keyed by id, in join order. Grows only.
    pub players: IndexMap<Uuid, PlayerEntity>,
    /// Cumulative points per player. Monotonically non-decreasing.
    pub scores: HashMap<Uuid, u32>,
    /// Consecutive-correct-answer counts per player.
    pub streaks: HashMap<Uuid, u32>,
    /// Option index submitted per player for the current question only;
    /// cleared on every question advance.
    pub answered: HashMap<Uuid, u8>,
    /// Join cap for the lobby; 0 means unlimited.
    pub max_players: usize,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// Build a fresh waiting session with the given code and empty rosters.
    pub fn new(code: String, max_players: usize) -> Self {
        let timestamp = SystemTime::now();
        Self {
            code,
            state: SessionState::Waiting,
            current_question: None,
            quiz: Vec::new(),
            players: IndexMap::new(),
            scores: HashMap::new(),
            streaks: HashMap::new(),
            answered: HashMap::new(),
            max_players,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// The live question, when one is being played.
    pub fn live_question(&self) -> Option<(usize, &QuestionEntity)> {
        if self.state != SessionState::Started {
            return None;
        }
        let index = self.current_question?;
        self.quiz.get(index).map(|question| (index, question))
    }
}
