//! In-process snapshot store. Several replicas sharing one instance behave like
//! replicas sharing a remote database, including change notifications.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use time::OffsetDateTime;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;

use crate::{
    dao::{
        models::{ResourceRecord, RotationRecord, TokenTallyEntity, tally_day},
        snapshot_store::{RemoteChange, SnapshotStore},
        storage::{StorageError, StorageResult},
    },
    state::roster::Team,
};

const CHANGE_CAPACITY: usize = 64;

/// Snapshot store living in process memory. Clones share the same slots.
#[derive(Clone)]
pub struct MemorySnapshotStore {
    inner: Arc<Inner>,
}

struct Inner {
    rotation: Mutex<Option<RotationRecord>>,
    resource: Mutex<Option<ResourceRecord>>,
    tallies: Mutex<IndexMap<(String, String), TokenTallyEntity>>,
    changes: broadcast::Sender<RemoteChange>,
    offline: AtomicBool,
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySnapshotStore {
    /// Empty store, online, with both slots unwritten.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                rotation: Mutex::new(None),
                resource: Mutex::new(None),
                tallies: Mutex::new(IndexMap::new()),
                changes,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Make every subsequent operation fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Release);
    }

    /// Tally recorded for `person` on the day of `at`.
    pub async fn tally(&self, person: &str, at: OffsetDateTime) -> Option<TokenTallyEntity> {
        let tallies = self.inner.tallies.lock().await;
        tallies.get(&(tally_day(at), person.to_string())).cloned()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::Acquire) {
            Err(StorageError::unavailable(
                "memory store is offline".into(),
                io::Error::from(io::ErrorKind::ConnectionRefused),
            ))
        } else {
            Ok(())
        }
    }

    fn publish(&self, change: RemoteChange) {
        let _ = self.inner.changes.send(change);
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_rotation(&self) -> BoxFuture<'static, StorageResult<Option<RotationRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.rotation.lock().await.clone())
        })
    }

    fn save_rotation(&self, record: RotationRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            *store.inner.rotation.lock().await = Some(record.clone());
            store.publish(RemoteChange::Rotation(record));
            Ok(())
        })
    }

    fn load_resource(&self) -> BoxFuture<'static, StorageResult<Option<ResourceRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.resource.lock().await.clone())
        })
    }

    fn save_resource(&self, record: ResourceRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            *store.inner.resource.lock().await = Some(record.clone());
            store.publish(RemoteChange::Resource(record));
            Ok(())
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
            store.ensure_online()?;
            let mut tallies = store.inner.tallies.lock().await;
            let key = (tally_day(at), person.clone());
            let next = match tallies.shift_remove(&key) {
                Some(existing) => existing.bump(team, at),
                None => TokenTallyEntity::first(&person, team, at),
            };
            tallies.insert(key, next);
            Ok(())
        })
    }

    fn subscribe(&self) -> BoxStream<'static, StorageResult<RemoteChange>> {
        BroadcastStream::new(self.inner.changes.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(change) => Some(Ok(change)),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "change subscriber lagged; relying on next pull");
                        None
                    }
                }
            })
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_are_visible_and_published() {
        let store = MemorySnapshotStore::new();
        let mut changes = store.subscribe();

        let record = RotationRecord {
            queue_eproc: vec!["Ana".into()],
            ..RotationRecord::default()
        };
        store.save_rotation(record.clone()).await.unwrap();

        assert_eq!(store.load_rotation().await.unwrap(), Some(record.clone()));
        assert_eq!(
            changes.next().await.unwrap().unwrap(),
            RemoteChange::Rotation(record)
        );
    }

    #[tokio::test]
    async fn offline_store_rejects_everything() {
        let store = MemorySnapshotStore::new();
        store.set_offline(true);
        assert!(store.load_resource().await.is_err());
        assert!(store.save_resource(ResourceRecord::default()).await.is_err());
        assert!(store.health_check().await.is_err());

        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
        assert_eq!(store.load_resource().await.unwrap(), None);
    }

    #[tokio::test]
    async fn tallies_accumulate_per_day() {
        let store = MemorySnapshotStore::new();
        let at = OffsetDateTime::from_unix_timestamp(1_000).unwrap();
        store
            .record_token_assumed("Ana".into(), Team::Eproc, at)
            .await
            .unwrap();
        store
            .record_token_assumed("Ana".into(), Team::Eproc, at)
            .await
            .unwrap();

        let tally = store.tally("Ana", at).await.unwrap();
        assert_eq!(tally.tokens_assumed, 2);
        assert!(store.tally("Bruno", at).await.is_none());
    }
}
