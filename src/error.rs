use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::{session_store::TransactError, storage::StorageError},
    services::{
        codes::{AllocateError, CodeError},
        quiz_service::QuizFetchError,
    },
    state::machine::TransitionError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Every probed session code was taken.
    #[error("session code allocation exhausted after {attempts} attempts")]
    AllocationExhausted {
        /// Number of codes tried before giving up.
        attempts: u32,
    },
    /// Optimistic update kept losing revision races.
    #[error("session update contention persisted after {attempts} attempts")]
    Contention {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// Requested session or player was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The state machine rejected the requested transition.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),
    /// The session is not in a state that accepts the action.
    #[error("not accepting: {0}")]
    NotAccepting(String),
    /// The external quiz source was unreachable or served garbage.
    #[error("quiz source: {0}")]
    Fetch(#[from] QuizFetchError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::IllegalTransition(err.to_string())
    }
}

impl From<CodeError> for ServiceError {
    fn from(err: CodeError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<AllocateError> for ServiceError {
    fn from(err: AllocateError) -> Self {
        match err {
            AllocateError::Exhausted { attempts } => ServiceError::AllocationExhausted { attempts },
            AllocateError::Storage(source) => ServiceError::Unavailable(source),
        }
    }
}

impl From<TransactError<ServiceError>> for ServiceError {
    fn from(err: TransactError<ServiceError>) -> Self {
        match err {
            TransactError::NotFound => ServiceError::NotFound("session not found".into()),
            TransactError::Storage(source) => ServiceError::Unavailable(source),
            TransactError::Contention { attempts } => ServiceError::Contention { attempts },
            TransactError::Aborted(inner) => inner,
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unavailable(_) | ServiceError::Degraded | ServiceError::Contention { .. } => {
                AppError::ServiceUnavailable(message)
            }
            // Exhaustion means the code space itself is in trouble; that is a
            // fault of the deployment, not of the caller.
            ServiceError::AllocationExhausted { .. } => AppError::Internal(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::IllegalTransition(_) | ServiceError::NotAccepting(_) => {
                AppError::Conflict(message)
            }
            ServiceError::Fetch(_) | ServiceError::InvalidInput(_) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
