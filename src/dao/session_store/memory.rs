//! In-memory session store used as the default backend and as the
//! deterministic transactional fake in tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    models::SessionEntity,
    session_store::SessionStore,
    storage::{CreateOutcome, ReplaceOutcome, Revision, StorageResult},
};

#[derive(Debug)]
struct Versioned {
    revision: u64,
    entity: SessionEntity,
}

/// Session store backed by a process-local concurrent map.
///
/// Revisions are a per-document counter rendered as strings so they line up
/// with the opaque [`Revision`] contract. Conditional semantics rely on the
/// map's per-shard locking: `create_if_absent` and `replace` each touch a
/// single entry under its shard lock, which makes them atomic with respect to
/// concurrent callers.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, Versioned>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session directly, bypassing the conditional-create path.
    ///
    /// Test helper; the runtime only goes through the trait.
    pub fn seed(&self, entity: SessionEntity) {
        self.sessions
            .insert(entity.code.clone(), Versioned { revision: 1, entity });
    }
}

impl SessionStore for MemorySessionStore {
    fn get(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<(SessionEntity, Revision)>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .sessions
                .get(&code)
                .map(|slot| (slot.entity.clone(), slot.revision.to_string())))
        })
    }

    fn create_if_absent(
        &self,
        entity: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            match store.sessions.entry(entity.code.clone()) {
                Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
                Entry::Vacant(slot) => {
                    slot.insert(Versioned {
                        revision: 1,
                        entity,
                    });
                    Ok(CreateOutcome::Created)
                }
            }
        })
    }

    fn replace(
        &self,
        expected: Revision,
        entity: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<ReplaceOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(mut slot) = store.sessions.get_mut(&entity.code) else {
                return Ok(ReplaceOutcome::Missing);
            };
            if slot.revision.to_string() != expected {
                return Ok(ReplaceOutcome::Conflict);
            }
            slot.revision += 1;
            slot.entity = entity;
            Ok(ReplaceOutcome::Applied)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(code: &str) -> SessionEntity {
        SessionEntity::new(code.into(), 0)
    }

    #[tokio::test]
    async fn conditional_create_admits_exactly_one_writer() {
        let store = MemorySessionStore::new();

        let first = store.create_if_absent(entity("QWERTY")).await.unwrap();
        let second = store.create_if_absent(entity("QWERTY")).await.unwrap();

        assert_eq!(first, CreateOutcome::Created);
        assert_eq!(second, CreateOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn replace_rejects_stale_revisions() {
        let store = MemorySessionStore::new();
        store.create_if_absent(entity("QWERTY")).await.unwrap();

        let (read, revision) = store.get("QWERTY".into()).await.unwrap().unwrap();

        // First writer wins with the fresh revision.
        let applied = store
            .replace(revision.clone(), read.clone())
            .await
            .unwrap();
        assert_eq!(applied, ReplaceOutcome::Applied);

        // Second writer still holds the old revision and must lose.
        let conflicted = store.replace(revision, read).await.unwrap();
        assert_eq!(conflicted, ReplaceOutcome::Conflict);
    }

    #[tokio::test]
    async fn replace_on_missing_document_reports_missing() {
        let store = MemorySessionStore::new();
        let outcome = store.replace("1".into(), entity("QWERTY")).await.unwrap();
        assert_eq!(outcome, ReplaceOutcome::Missing);
    }

    #[tokio::test]
    async fn revisions_advance_on_every_applied_write() {
        let store = MemorySessionStore::new();
        store.create_if_absent(entity("QWERTY")).await.unwrap();

        for expected in ["1", "2", "3"] {
            let (read, revision) = store.get("QWERTY".into()).await.unwrap().unwrap();
            assert_eq!(revision, expected);
            store.replace(revision, read).await.unwrap();
        }
    }
}
