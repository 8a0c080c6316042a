//! Pure lifecycle rules for a session: which events are legal in which state
//! and what they do to the question cursor. All the functions here are
//! side-effect free so they can run inside a transactional update closure.

use thiserror::Error;

use crate::dao::models::{SessionEntity, SessionState};

/// Lifecycle events a host can fire at a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Open the first question (Waiting → Started).
    Start,
    /// Move to the next question, or finish when none remain.
    Advance,
    /// Terminate the session regardless of remaining questions.
    End,
}

/// Error returned when an event cannot be applied in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event is not legal from this state.
    #[error("{event:?} is not allowed while the session is {from:?}")]
    Illegal {
        /// State the session was in when the event arrived.
        from: SessionState,
        /// The rejected event.
        event: SessionEvent,
    },
    /// Starting requires at least one question.
    #[error("cannot start a session with an empty quiz")]
    EmptyQuiz,
}

/// The concrete state change a legal event produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Enter Started with the cursor on question 0.
    Begin,
    /// Stay Started, cursor moves to the given question, answers reset.
    NextQuestion(usize),
    /// Enter Ended; scores freeze.
    Finish,
    /// Nothing to do. Duplicate advance/end deliveries against an ended
    /// session land here instead of erroring.
    Stay,
}

/// Validate an event against the session and compute the resulting
/// transition without applying it.
pub fn plan(session: &SessionEntity, event: SessionEvent) -> Result<Transition, TransitionError> {
    let next = match (session.state, event) {
        (SessionState::Waiting, SessionEvent::Start) => {
            if session.quiz.is_empty() {
                return Err(TransitionError::EmptyQuiz);
            }
            Transition::Begin
        }
        (SessionState::Started, SessionEvent::Advance) => {
            let cursor = session.current_question.unwrap_or(0);
            if cursor + 1 < session.quiz.len() {
                Transition::NextQuestion(cursor + 1)
            } else {
                Transition::Finish
            }
        }
        // Ending from Waiting covers an abandoned lobby; from Started it is
        // the host cutting the game short.
        (SessionState::Waiting | SessionState::Started, SessionEvent::End) => Transition::Finish,
        (SessionState::Ended, SessionEvent::Advance | SessionEvent::End) => Transition::Stay,
        (from, event) => return Err(TransitionError::Illegal { from, event }),
    };

    Ok(next)
}

/// Apply a planned transition to the session in place.
pub fn apply(session: &mut SessionEntity, transition: Transition) {
    match transition {
        Transition::Begin => {
            session.state = SessionState::Started;
            session.current_question = Some(0);
            session.answered.clear();
        }
        Transition::NextQuestion(index) => {
            session.current_question = Some(index);
            session.answered.clear();
        }
        Transition::Finish => {
            session.state = SessionState::Ended;
            session.current_question = None;
        }
        Transition::Stay => {}
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::QuestionEntity;

    fn question(text: &str) -> QuestionEntity {
        QuestionEntity {
            text: text.into(),
            image: None,
            options: [
                "north".into(),
                "south".into(),
                "east".into(),
                "west".into(),
            ],
            correct: 2,
        }
    }

    fn session_with_questions(count: usize) -> SessionEntity {
        let mut session = SessionEntity::new("AB12CD".into(), 0);
        session.quiz = (0..count).map(|i| question(&format!("q{i}"))).collect();
        session
    }

    fn fire(session: &mut SessionEntity, event: SessionEvent) -> Transition {
        let transition = plan(session, event).unwrap();
        apply(session, transition);
        transition
    }

    #[test]
    fn start_opens_question_zero_and_clears_answers() {
        let mut session = session_with_questions(3);
        session.answered.insert(Uuid::new_v4(), 1);

        assert_eq!(fire(&mut session, SessionEvent::Start), Transition::Begin);
        assert_eq!(session.state, SessionState::Started);
        assert_eq!(session.current_question, Some(0));
        assert!(session.answered.is_empty());
    }

    #[test]
    fn start_requires_a_quiz() {
        let session = session_with_questions(0);
        assert_eq!(
            plan(&session, SessionEvent::Start),
            Err(TransitionError::EmptyQuiz)
        );
    }

    #[test]
    fn start_is_illegal_once_running() {
        let mut session = session_with_questions(2);
        fire(&mut session, SessionEvent::Start);

        assert_eq!(
            plan(&session, SessionEvent::Start),
            Err(TransitionError::Illegal {
                from: SessionState::Started,
                event: SessionEvent::Start,
            })
        );
    }

    #[test]
    fn advance_walks_every_question_then_ends() {
        let mut session = session_with_questions(3);
        fire(&mut session, SessionEvent::Start);

        assert_eq!(
            fire(&mut session, SessionEvent::Advance),
            Transition::NextQuestion(1)
        );
        assert_eq!(
            fire(&mut session, SessionEvent::Advance),
            Transition::NextQuestion(2)
        );
        assert_eq!(fire(&mut session, SessionEvent::Advance), Transition::Finish);
        assert_eq!(session.state, SessionState::Ended);
        assert_eq!(session.current_question, None);
    }

    #[test]
    fn cursor_never_exceeds_quiz_bounds_while_started() {
        let mut session = session_with_questions(4);
        fire(&mut session, SessionEvent::Start);

        while session.state == SessionState::Started {
            if let Some(cursor) = session.current_question {
                assert!(cursor < session.quiz.len());
            }
            fire(&mut session, SessionEvent::Advance);
        }
    }

    #[test]
    fn advance_clears_the_answered_set() {
        let mut session = session_with_questions(2);
        fire(&mut session, SessionEvent::Start);
        session.answered.insert(Uuid::new_v4(), 3);

        fire(&mut session, SessionEvent::Advance);
        assert!(session.answered.is_empty());
    }

    #[test]
    fn advance_before_start_is_illegal() {
        let session = session_with_questions(2);
        assert_eq!(
            plan(&session, SessionEvent::Advance),
            Err(TransitionError::Illegal {
                from: SessionState::Waiting,
                event: SessionEvent::Advance,
            })
        );
    }

    #[test]
    fn duplicate_advance_after_the_end_is_a_noop() {
        let mut session = session_with_questions(1);
        fire(&mut session, SessionEvent::Start);
        fire(&mut session, SessionEvent::Advance);
        assert_eq!(session.state, SessionState::Ended);

        assert_eq!(fire(&mut session, SessionEvent::Advance), Transition::Stay);
        assert_eq!(fire(&mut session, SessionEvent::End), Transition::Stay);
        assert_eq!(session.state, SessionState::Ended);
    }

    #[test]
    fn end_cuts_a_running_session_short() {
        let mut session = session_with_questions(5);
        fire(&mut session, SessionEvent::Start);

        assert_eq!(fire(&mut session, SessionEvent::End), Transition::Finish);
        assert_eq!(session.state, SessionState::Ended);
    }

    #[test]
    fn end_from_waiting_abandons_the_lobby() {
        let mut session = session_with_questions(0);
        assert_eq!(fire(&mut session, SessionEvent::End), Transition::Finish);
        assert_eq!(session.state, SessionState::Ended);
    }
}
