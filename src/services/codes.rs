//! Join-code handling: random generation, canonical/display formatting, and
//! unique allocation against the session store.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::dao::{
    models::SessionEntity,
    session_store::SessionStore,
    storage::{CreateOutcome, StorageError},
};

/// Length of a canonical session code.
pub const CODE_LENGTH: usize = 6;

/// The 36-symbol alphabet codes are drawn from, uniformly.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Reasons a submitted code string cannot be a session code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodeError {
    /// Wrong number of significant characters.
    #[error("session code must be 6 characters, got {0}")]
    Length(usize),
    /// A character outside the code alphabet.
    #[error("session code may only contain letters and digits")]
    Charset,
}

/// Draw a fresh random code in canonical form.
pub fn random_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[index] as char
        })
        .collect()
}

/// Normalize client input to the canonical stored form.
///
/// Accepts either the canonical form or the display form in any casing:
/// separators and surrounding whitespace are stripped and letters uppercased,
/// so `normalize(display(code)) == code` for every canonical `code`.
pub fn normalize(input: &str) -> Result<String, CodeError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() != CODE_LENGTH {
        return Err(CodeError::Length(cleaned.len()));
    }
    if !cleaned.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return Err(CodeError::Charset);
    }

    Ok(cleaned)
}

/// Format a canonical code for display, grouped as `XXX-XXX`.
pub fn display(code: &str) -> String {
    if code.len() == CODE_LENGTH {
        format!("{}-{}", &code[..3], &code[3..])
    } else {
        code.to_owned()
    }
}

/// Failures of the allocation loop.
#[derive(Debug, Error)]
pub enum AllocateError {
    /// Every probe collided with an existing code.
    #[error("session code allocation exhausted after {attempts} attempts")]
    Exhausted {
        /// Number of codes tried.
        attempts: u32,
    },
    /// The backend failed outright.
    #[error("storage backend failure")]
    Storage(#[source] StorageError),
}

/// Allocate a globally unique code by conditionally creating a fresh session
/// under it.
///
/// When two callers draw the same code concurrently the store admits exactly
/// one create; the loser falls through to a new random draw. The attempt cap
/// exists because a 36^6 space makes systematic exhaustion astronomically
/// unlikely, not impossible.
pub async fn allocate(
    store: &Arc<dyn SessionStore>,
    max_players: usize,
    max_attempts: u32,
) -> Result<SessionEntity, AllocateError> {
    for attempt in 1..=max_attempts {
        let code = random_code();
        let entity = SessionEntity::new(code.clone(), max_players);

        match store
            .create_if_absent(entity.clone())
            .await
            .map_err(AllocateError::Storage)?
        {
            CreateOutcome::Created => return Ok(entity),
            CreateOutcome::AlreadyExists => {
                debug!(%code, attempt, "code already taken; drawing a fresh one");
            }
        }
    }

    Err(AllocateError::Exhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::{
        session_store::memory::MemorySessionStore,
        storage::{ReplaceOutcome, Revision, StorageResult},
    };

    #[test]
    fn random_codes_use_the_canonical_alphabet() {
        for _ in 0..100 {
            let code = random_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn normalize_accepts_display_form_case_insensitively() {
        assert_eq!(normalize("ab1-2cd").unwrap(), "AB12CD");
        assert_eq!(normalize("AB12CD").unwrap(), "AB12CD");
        assert_eq!(normalize(" ab12cd ").unwrap(), "AB12CD");
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert_eq!(normalize("AB12C"), Err(CodeError::Length(5)));
        assert_eq!(normalize("AB12CDE"), Err(CodeError::Length(7)));
        assert_eq!(normalize("AB12C!"), Err(CodeError::Charset));
        assert_eq!(normalize(""), Err(CodeError::Length(0)));
    }

    #[test]
    fn display_round_trips_through_normalize() {
        for _ in 0..50 {
            let code = random_code();
            assert_eq!(display(&code), format!("{}-{}", &code[..3], &code[3..]));
            assert_eq!(normalize(&display(&code)).unwrap(), code);
        }
    }

    #[tokio::test]
    async fn concurrent_allocations_never_collide() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { allocate(&store, 0, 8).await },
            ));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            let entity = handle.await.unwrap().unwrap();
            assert!(codes.insert(entity.code.clone()), "duplicate code allocated");
            // The winning create is visible in the store.
            assert!(store.get(entity.code).await.unwrap().is_some());
        }
        assert_eq!(codes.len(), 32);
    }

    /// Store double whose keyspace is permanently full.
    struct SaturatedStore;

    impl SessionStore for SaturatedStore {
        fn get(
            &self,
            _code: String,
        ) -> BoxFuture<'static, StorageResult<Option<(SessionEntity, Revision)>>> {
            Box::pin(async { Ok(None) })
        }

        fn create_if_absent(
            &self,
            _entity: SessionEntity,
        ) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
            Box::pin(async { Ok(CreateOutcome::AlreadyExists) })
        }

        fn replace(
            &self,
            _expected: Revision,
            _entity: SessionEntity,
        ) -> BoxFuture<'static, StorageResult<ReplaceOutcome>> {
            Box::pin(async { Ok(ReplaceOutcome::Missing) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn allocation_gives_up_after_the_attempt_cap() {
        let store: Arc<dyn SessionStore> = Arc::new(SaturatedStore);
        let err = allocate(&store, 0, 8).await.unwrap_err();
        assert!(matches!(err, AllocateError::Exhausted { attempts: 8 }));
    }
}
