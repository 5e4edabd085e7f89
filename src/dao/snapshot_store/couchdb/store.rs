use std::{sync::Arc, time::Duration};

use async_stream::try_stream;
use futures::{future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    dao::{
        models::{ResourceRecord, RotationRecord, TokenTallyEntity, tally_day},
        snapshot_store::{RemoteChange, SnapshotStore},
        storage::{StorageError, StorageResult},
    },
    state::roster::Team,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        ChangeRow, ChangesResponse, CouchDocument, CouchResourceDocument, CouchRotationDocument,
        CouchTallyDocument, RESOURCE_DOC_ID, ROTATION_DOC_ID, RevisionOnly, seq_param,
        tally_doc_id,
    },
};

/// Attempts at overwriting a document when its revision moves underneath us.
const MAX_PUT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct CouchSnapshotStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    longpoll_timeout: Duration,
}

impl CouchSnapshotStore {
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
            longpoll_timeout: config.longpoll_timeout,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another replica created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
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

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    /// Overwrite `doc_id` with `body` whatever its current revision is.
    async fn overwrite<T>(&self, doc_id: &str, body: &T) -> CouchResult<()>
    where
        T: Serialize,
    {
        for attempt in 0..MAX_PUT_ATTEMPTS {
            let rev = self
                .get_document::<RevisionOnly>(doc_id)
                .await?
                .map(|current| current.rev);
            let document = CouchDocument {
                id: doc_id.to_string(),
                rev,
                body,
            };
            match self.put_document(doc_id, &document).await {
                Err(CouchDaoError::RequestStatus { status, .. }) if status == StatusCode::CONFLICT => {
                    debug!(doc_id, attempt, "revision moved while overwriting; retrying");
                }
                other => return other,
            }
        }

        Err(CouchDaoError::Conflict {
            path: doc_id.to_string(),
        })
    }

    /// One long-poll round of the `_changes` feed restricted to the two slots.
    async fn changes_since(&self, since: &Value) -> CouchResult<ChangesResponse> {
        const CHANGES: &str = "_changes";
        let doc_ids = format!("[\"{ROTATION_DOC_ID}\",\"{RESOURCE_DOC_ID}\"]");
        let query = [
            ("feed", "longpoll".to_string()),
            ("include_docs", "true".to_string()),
            ("filter", "_doc_ids".to_string()),
            ("doc_ids", doc_ids),
            ("since", seq_param(since)),
            ("timeout", self.longpoll_timeout.as_millis().to_string()),
        ];

        let response = self
            .request(Method::GET, CHANGES)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }
}

/// Turn a `_changes` row into a slot change, skipping deletions and rows
/// without an inlined document.
fn decode_change(row: ChangeRow) -> CouchResult<Option<RemoteChange>> {
    if row.deleted {
        return Ok(None);
    }
    let Some(doc) = row.doc else {
        return Ok(None);
    };

    let decode_err = |source| CouchDaoError::DeserializeValue {
        path: row.id.clone(),
        source,
    };
    let change = match row.id.as_str() {
        ROTATION_DOC_ID => {
            let doc: CouchRotationDocument = from_value(doc).map_err(decode_err)?;
            Some(RemoteChange::Rotation(doc.body))
        }
        RESOURCE_DOC_ID => {
            let doc: CouchResourceDocument = from_value(doc).map_err(decode_err)?;
            Some(RemoteChange::Resource(doc.body))
        }
        _ => None,
    };
    Ok(change)
}

impl SnapshotStore for CouchSnapshotStore {
    fn load_rotation(&self) -> BoxFuture<'static, StorageResult<Option<RotationRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchRotationDocument>(ROTATION_DOC_ID)
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn save_rotation(&self, record: RotationRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .overwrite(ROTATION_DOC_ID, &record)
                .await
                .map_err(Into::into)
        })
    }

    fn load_resource(&self) -> BoxFuture<'static, StorageResult<Option<ResourceRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchResourceDocument>(RESOURCE_DOC_ID)
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn save_resource(&self, record: ResourceRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .overwrite(RESOURCE_DOC_ID, &record)
                .await
                .map_err(Into::into)
        })
    }

    fn record_token_assumed(
        &self,
        person: String,
        team: Team,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = tally_doc_id(&tally_day(at), &person);
            for _ in 0..MAX_PUT_ATTEMPTS {
                let existing = store.get_document::<CouchTallyDocument>(&doc_id).await?;
                let (rev, tally) = match existing {
                    Some(doc) => (doc.rev, doc.body.bump(team, at)),
                    None => (None, TokenTallyEntity::first(&person, team, at)),
                };
                let document = CouchDocument {
                    id: doc_id.clone(),
                    rev,
                    body: tally,
                };
                match store.put_document(&doc_id, &document).await {
                    Err(CouchDaoError::RequestStatus { status, .. })
                        if status == StatusCode::CONFLICT =>
                    {
                        continue;
                    }
                    other => return other.map_err(Into::into),
                }
            }
            Err(CouchDaoError::Conflict { path: doc_id }.into())
        })
    }

    fn subscribe(&self) -> BoxStream<'static, StorageResult<RemoteChange>> {
        let store = self.clone();
        Box::pin(try_stream! {
            let mut since = Value::String("now".into());
            loop {
                let page = store
                    .changes_since(&since)
                    .await
                    .map_err(StorageError::from)?;
                since = page.last_seq;
                for row in page.results {
                    if let Some(change) = decode_change(row).map_err(StorageError::from)? {
                        yield change;
                    }
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, doc: Option<Value>) -> ChangeRow {
        serde_json::from_value(serde_json::json!({ "id": id, "doc": doc })).unwrap()
    }

    #[test]
    fn rotation_rows_decode_into_changes() {
        let change = decode_change(row(
            ROTATION_DOC_ID,
            Some(serde_json::json!({
                "_id": ROTATION_DOC_ID,
                "_rev": "7-x",
                "queueEproc": ["Ana"]
            })),
        ))
        .unwrap();
        match change {
            Some(RemoteChange::Rotation(record)) => assert_eq!(record.queue_eproc, vec!["Ana"]),
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn deleted_and_foreign_rows_are_skipped() {
        let deleted: ChangeRow = serde_json::from_value(serde_json::json!({
            "id": RESOURCE_DOC_ID,
            "deleted": true
        }))
        .unwrap();
        assert!(decode_change(deleted).unwrap().is_none());
        assert!(
            decode_change(row("tally::x", Some(serde_json::json!({}))))
                .unwrap()
                .is_none()
        );
        assert!(decode_change(row(ROTATION_DOC_ID, None)).unwrap().is_none());
    }

    #[test]
    fn malformed_rows_are_errors() {
        let result = decode_change(row(
            RESOURCE_DOC_ID,
            Some(serde_json::json!({ "inUse": "yes" })),
        ));
        assert!(result.is_err());
    }
}
