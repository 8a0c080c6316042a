use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::dao::{
    models::SessionEntity,
    session_store::SessionStore,
    storage::{CreateOutcome, ReplaceOutcome, Revision, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchSessionDocument, session_doc_id},
};

/// Session store speaking the CouchDB document API over HTTP.
#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchSessionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
                        .send()
                        .await
                        .map_err(|source| CouchDaoError::DatabaseCreate {
                            database: database.clone(),
                            source,
                        })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document and classify the outcome. 409 is not an error here: it
    /// is the signal the whole concurrency protocol is built on. CouchDB also
    /// answers 409 for writes against deleted documents, so there is no
    /// separate missing case; the caller's re-read resolves it.
    async fn put_document(&self, doc: &CouchSessionDocument) -> CouchResult<PutStatus> {
        let response = self
            .request(Method::PUT, &doc.id)
            .json(doc)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc.id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutStatus::Conflict),
            status if status.is_success() => Ok(PutStatus::Written),
            other => Err(CouchDaoError::RequestStatus {
                path: doc.id.clone(),
                status: other,
            }),
        }
    }
}

enum PutStatus {
    Written,
    Conflict,
}

impl SessionStore for CouchSessionStore {
    fn get(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<(SessionEntity, Revision)>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = session_doc_id(&code);
            let maybe_doc = store.get_document::<CouchSessionDocument>(&doc_id).await?;
            Ok(maybe_doc.and_then(|doc| doc.rev.map(|rev| (doc.session, rev))))
        })
    }

    fn create_if_absent(
        &self,
        entity: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = CouchSessionDocument::from_entity(entity, None);
            match store.put_document(&doc).await? {
                PutStatus::Written => Ok(CreateOutcome::Created),
                // A revision-less PUT conflicts exactly when the id is taken.
                PutStatus::Conflict => Ok(CreateOutcome::AlreadyExists),
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
            let doc = CouchSessionDocument::from_entity(entity, Some(expected));
            match store.put_document(&doc).await? {
                PutStatus::Written => Ok(ReplaceOutcome::Applied),
                PutStatus::Conflict => Ok(ReplaceOutcome::Conflict),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let mut builder = store.client.get(&url);
            if let Some((ref user, ref pass)) = store.auth {
                builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
            }

            let response = builder
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
