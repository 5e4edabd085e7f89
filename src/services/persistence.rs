//! Single background writer for local snapshots.
//!
//! Mutations only enqueue; the writer drains whatever accumulated, writes the
//! latest snapshot of each slot, then settles every drained job. Failures are
//! logged and dropped: the next pull restores the store's view.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    dao::models::{ResourceRecord, RotationRecord},
    state::{PersistJob, SharedState},
};

/// Start the writer. Only the first call takes the queue; later calls return
/// a task that exits immediately.
pub fn spawn_writer(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(run_writer(state))
}

async fn run_writer(state: SharedState) {
    let Some(mut queue) = state.take_persist_queue().await else {
        warn!("persistence writer already running");
        return;
    };

    while let Some(first) = queue.recv().await {
        let mut batch = vec![first];
        while let Ok(job) = queue.try_recv() {
            batch.push(job);
        }

        let rotation = batch.iter().rev().find_map(|job| match job {
            PersistJob::Rotation(record) => Some(record.clone()),
            PersistJob::Resource(_) => None,
        });
        let resource = batch.iter().rev().find_map(|job| match job {
            PersistJob::Resource(record) => Some(record.clone()),
            PersistJob::Rotation(_) => None,
        });
        debug!(jobs = batch.len(), "writing snapshot batch");

        write(&state, rotation, resource).await;

        for job in &batch {
            state.pending_writes().settle(job);
        }
    }

    debug!("persistence queue closed");
}

async fn write(
    state: &SharedState,
    rotation: Option<RotationRecord>,
    resource: Option<ResourceRecord>,
) {
    let Some(store) = state.snapshot_store().await else {
        warn!("storage unavailable (degraded mode); local change not persisted");
        return;
    };

    if let Some(record) = rotation {
        if let Err(err) = store.save_rotation(record).await {
            warn!(error = %err, "failed to persist rotation snapshot");
        }
    }
    if let Some(record) = resource {
        if let Err(err) = store.save_resource(record).await {
            warn!(error = %err, "failed to persist resource snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::snapshot_store::{SnapshotStore, memory::MemorySnapshotStore},
        services::sync_service,
        state::AppState,
    };

    async fn settled(state: &SharedState) {
        for _ in 0..100 {
            if !state.pending_writes().rotation_in_flight()
                && !state.pending_writes().resource_in_flight()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("writes never settled");
    }

    #[tokio::test]
    async fn writer_persists_latest_snapshot() {
        let state = AppState::new(AppConfig::default());
        let store = MemorySnapshotStore::new();
        sync_service::attach(&state, Arc::new(store.clone())).await.unwrap();
        spawn_writer(state.clone());

        for name in ["Ana", "Bruno"] {
            state.enqueue_persist(PersistJob::Rotation(RotationRecord {
                queue_eproc: vec![name.to_string()],
                ..RotationRecord::default()
            }));
        }
        settled(&state).await;

        let stored = store.load_rotation().await.unwrap().unwrap();
        assert_eq!(stored.queue_eproc, vec!["Bruno"]);
    }

    #[tokio::test]
    async fn failed_writes_still_settle() {
        let state = AppState::new(AppConfig::default());
        let store = MemorySnapshotStore::new();
        sync_service::attach(&state, Arc::new(store.clone())).await.unwrap();
        store.set_offline(true);
        spawn_writer(state.clone());

        state.enqueue_persist(PersistJob::Resource(ResourceRecord::default()));
        settled(&state).await;

        store.set_offline(false);
        assert_eq!(store.load_resource().await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_writer_exits() {
        let state = AppState::new(AppConfig::default());
        spawn_writer(state.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = spawn_writer(state.clone());
        assert!(second.await.is_ok());
    }
}
