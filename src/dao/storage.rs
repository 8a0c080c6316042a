use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Opaque optimistic-concurrency token attached to a stored session.
///
/// Backends choose their own representation (CouchDB `_rev` strings, counter
/// values rendered as strings for the in-memory store); callers only ever
/// hand it back unchanged.
pub type Revision = String;

/// Result of a conditional create against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The document did not exist and was written.
    Created,
    /// Another caller owns this key already; nothing was written.
    AlreadyExists,
}

/// Result of a compare-and-swap replace against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The revision matched and the new value was written.
    Applied,
    /// The revision was stale; nothing was written.
    Conflict,
    /// The document no longer exists; nothing was written.
    Missing,
}

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
