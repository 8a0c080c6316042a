//! Storage abstraction the session core runs against, plus the single
//! optimistic read-modify-write loop every mutating operation goes through.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::{
    config::RetryPolicy,
    dao::{
        models::SessionEntity,
        storage::{CreateOutcome, ReplaceOutcome, Revision, StorageError, StorageResult},
    },
};

/// Abstraction over the persistence layer for session documents.
///
/// The contract is deliberately small: point reads, conditional creates, and
/// revision-guarded replaces. Everything richer (retry, idempotency, state
/// transitions) is layered on top in [`transact`] so backends stay dumb.
pub trait SessionStore: Send + Sync {
    /// Fetch a session and its current revision, if the code is known.
    fn get(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<(SessionEntity, Revision)>>>;
    /// Write a session only if its code is not taken yet.
    fn create_if_absent(
        &self,
        entity: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome>>;
    /// Replace a session only if `expected` still matches the stored revision.
    fn replace(
        &self,
        expected: Revision,
        entity: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<ReplaceOutcome>>;
    /// Cheap connectivity probe used by the supervisor and health endpoint.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a lost backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// What a transaction closure decided to do with the session it was handed.
#[derive(Debug)]
pub enum TxDecision<T> {
    /// Write the mutated session back and return the value.
    Commit(T),
    /// Leave the stored session untouched and return the value. The closure
    /// must not have mutated the entity when it skips.
    Skip(T),
}

/// Failures of a [`transact`] run, generic over the closure's own error type.
#[derive(Debug, Error)]
pub enum TransactError<E> {
    /// No session exists under the requested code.
    #[error("session not found")]
    NotFound,
    /// The backend failed outright.
    #[error("storage backend failure")]
    Storage(#[source] StorageError),
    /// Revision conflicts persisted through every allowed attempt.
    #[error("store contention persisted after {attempts} attempts")]
    Contention {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// The closure rejected the operation; nothing was written.
    #[error(transparent)]
    Aborted(E),
}

/// Run one atomic read-modify-write against a session document.
///
/// The closure receives the freshly read entity and re-derives the complete
/// next value from it; it is re-invoked from a fresh read whenever the
/// compare-and-swap loses a race, so it must be side-effect free. Contention
/// retries are bounded by `retry` with exponential backoff and are unrelated
/// to the semantic retry used for code allocation.
pub async fn transact<T, E, F>(
    store: &Arc<dyn SessionStore>,
    code: &str,
    retry: &RetryPolicy,
    mut apply: F,
) -> Result<(T, SessionEntity), TransactError<E>>
where
    F: FnMut(&mut SessionEntity) -> Result<TxDecision<T>, E>,
{
    let mut backoff = retry.initial_backoff;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let Some((current, revision)) = store
            .get(code.to_owned())
            .await
            .map_err(TransactError::Storage)?
        else {
            return Err(TransactError::NotFound);
        };

        let mut next = current;
        match apply(&mut next).map_err(TransactError::Aborted)? {
            TxDecision::Skip(value) => return Ok((value, next)),
            TxDecision::Commit(value) => {
                next.updated_at = SystemTime::now();
                match store
                    .replace(revision, next.clone())
                    .await
                    .map_err(TransactError::Storage)?
                {
                    ReplaceOutcome::Applied => return Ok((value, next)),
                    ReplaceOutcome::Missing => return Err(TransactError::NotFound),
                    ReplaceOutcome::Conflict => {
                        if attempt >= retry.max_attempts {
                            return Err(TransactError::Contention { attempts: attempt });
                        }
                        debug!(%code, attempt, "session update lost revision race; retrying");
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(retry.max_backoff);
                    }
                }
            }
        }
    }
}
