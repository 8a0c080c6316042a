//! CouchDB-backed session store. The database's MVCC `_rev` token doubles as
//! the session [`Revision`](crate::dao::storage::Revision): conditional
//! creates are revision-less PUTs and replaces are revision-guarded PUTs, so
//! the 409 Conflict status carries the whole concurrency protocol.

mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::{CouchDaoError, CouchResult};
pub use store::CouchSessionStore;
