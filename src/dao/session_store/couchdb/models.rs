use serde::{Deserialize, Serialize};

use crate::dao::models::SessionEntity;

pub const SESSION_PREFIX: &str = "session::";

/// Session document as stored in CouchDB: the entity body plus the `_id` /
/// `_rev` bookkeeping fields CouchDB manages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: SessionEntity,
}

impl CouchSessionDocument {
    /// Wrap an entity for writing, with or without a revision guard.
    pub fn from_entity(session: SessionEntity, rev: Option<String>) -> Self {
        Self {
            id: session_doc_id(&session.code),
            rev,
            session,
        }
    }
}

pub fn session_doc_id(code: &str) -> String {
    format!("{SESSION_PREFIX}{code}")
}
