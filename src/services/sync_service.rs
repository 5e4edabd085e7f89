//! Keeps the local snapshots converged with the remote store.
//!
//! Two loops run side by side: a push loop applying changes announced by the
//! store, and a fixed-interval pull that covers dropped notifications and
//! undoes local changes the store never accepted.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{ResourceRecord, RotationRecord},
        snapshot_store::{RemoteChange, SnapshotStore},
    },
    dto::board::SyncReport,
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState, Slot,
        board::{Board, SyncSource, should_adopt},
        resource::ResourceLock,
    },
};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Start the pull and push loops.
pub fn spawn(state: SharedState) {
    tokio::spawn(run_pull_loop(state.clone()));
    tokio::spawn(run_push_loop(state));
}

async fn run_pull_loop(state: SharedState) {
    let mut ticker = interval(state.config().poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match pull(&state).await {
            Ok(report) if report.rotation_adopted || report.resource_adopted => {
                debug!(?report, "pull adopted remote snapshots");
            }
            Ok(_) => {}
            Err(ServiceError::Degraded) => debug!("skipping pull while degraded"),
            Err(err) => warn!(error = %err, "failed to pull remote snapshots"),
        }
    }
}

async fn run_push_loop(state: SharedState) {
    loop {
        let Some(store) = state.snapshot_store().await else {
            sleep(RESUBSCRIBE_DELAY).await;
            continue;
        };

        info!("subscribed to remote changes");
        let mut changes = store.subscribe();
        while let Some(change) = changes.next().await {
            match change {
                Ok(RemoteChange::Rotation(record)) => {
                    reconcile_rotation(&state, record, SyncSource::Push).await;
                }
                Ok(RemoteChange::Resource(record)) => {
                    reconcile_resource(&state, record, SyncSource::Push).await;
                }
                Err(err) => {
                    warn!(error = %err, "remote change subscription failed; resubscribing");
                    break;
                }
            }
        }

        sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Install `store` and pull both slots right away, so local writes resume
/// only once this replica has seen what the store holds.
pub async fn attach(
    state: &SharedState,
    store: Arc<dyn SnapshotStore>,
) -> Result<SyncReport, ServiceError> {
    state.install_snapshot_store(store).await;
    pull(state).await
}

/// Fetch both slots and reconcile them with the local snapshots.
///
/// Each slot is settled before the next one is fetched. A slot written locally
/// while its fetch was in flight is left alone until the next pull. Slots never
/// written remotely are left alone as well.
pub async fn pull(state: &SharedState) -> Result<SyncReport, ServiceError> {
    let store = state.require_snapshot_store().await?;
    let pending = state.pending_writes();

    let seen = pending.generation(Slot::Rotation);
    let rotation = store.load_rotation().await?;
    let rotation_adopted = match rotation {
        Some(record) => adopt_rotation(state, record, SyncSource::Poll, Some(seen)).await,
        None => {
            let _board = state.board().write().await;
            pending.mark_synced(Slot::Rotation);
            false
        }
    };

    let seen = pending.generation(Slot::Resource);
    let resource = store.load_resource().await?;
    let resource_adopted = match resource {
        Some(record) => adopt_resource(state, record, SyncSource::Poll, Some(seen)).await,
        None => {
            let _resource = state.resource().write().await;
            pending.mark_synced(Slot::Resource);
            false
        }
    };

    Ok(SyncReport {
        rotation_adopted,
        resource_adopted,
    })
}

/// Replace the local board with `record` when the stamps say so. Returns
/// whether the remote snapshot was adopted.
pub async fn reconcile_rotation(
    state: &SharedState,
    record: RotationRecord,
    source: SyncSource,
) -> bool {
    adopt_rotation(state, record, source, None).await
}

/// Replace the local resource state with `record` when it differs and no
/// local resource write is pending.
pub async fn reconcile_resource(
    state: &SharedState,
    record: ResourceRecord,
    source: SyncSource,
) -> bool {
    adopt_resource(state, record, source, None).await
}

/// `seen` is the rotation write generation observed before `record` was
/// fetched; any write accepted since then makes `record` stale.
async fn adopt_rotation(
    state: &SharedState,
    record: RotationRecord,
    source: SyncSource,
    seen: Option<u64>,
) -> bool {
    let remote = Board::from(record);
    let pending = state.pending_writes();
    {
        let mut guard = state.board().write().await;
        let stale =
            seen.is_some_and(|generation| pending.generation(Slot::Rotation) != generation);
        let busy = stale || pending.in_flight(Slot::Rotation);
        let adopt = should_adopt(
            guard.last_mutation.as_ref(),
            remote.last_mutation.as_ref(),
            source,
            busy,
        );
        if adopt {
            *guard = remote.clone();
        }
        if guard.last_mutation == remote.last_mutation {
            pending.mark_synced(Slot::Rotation);
        }
        if !adopt {
            return false;
        }
    }

    debug!(
        ?source,
        stamp = ?remote.last_mutation.as_ref().map(|stamp| stamp.timestamp),
        "adopted remote rotation snapshot"
    );
    sse_events::broadcast_board(state, &remote);
    true
}

async fn adopt_resource(
    state: &SharedState,
    record: ResourceRecord,
    source: SyncSource,
    seen: Option<u64>,
) -> bool {
    let remote = ResourceLock::from(record);
    let pending = state.pending_writes();
    {
        let mut guard = state.resource().write().await;
        if *guard == remote {
            pending.mark_synced(Slot::Resource);
            return false;
        }
        let stale =
            seen.is_some_and(|generation| pending.generation(Slot::Resource) != generation);
        if stale || pending.in_flight(Slot::Resource) {
            return false;
        }
        *guard = remote.clone();
        pending.mark_synced(Slot::Resource);
    }

    debug!(?source, "adopted remote resource snapshot");
    sse_events::broadcast_resource(state, &remote);
    true
}
