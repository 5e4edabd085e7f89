use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{snapshot_store::SnapshotStore, storage::StorageError},
    dto::board::SyncReport,
    error::ServiceError,
    services::{sse_events, sync_service},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the snapshot store and keep the replica in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SnapshotStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                info!("snapshot store connected; leaving degraded mode");
                report_resync(sync_service::attach(&state, store.clone()).await);
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("snapshot store healthy again; leaving degraded mode");
                                state.update_degraded(false);
                                report_resync(sync_service::pull(&state).await);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "snapshot store health check failed");
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!("snapshot store reconnected after health check failure");
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "snapshot store reconnect failed; entering degraded mode"
                                            );
                                            state.update_degraded(true);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "snapshot store reconnect attempt failed");
                                        }
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                state.update_degraded(false);
                                report_resync(sync_service::pull(&state).await);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }

                            warn!("exhausted snapshot store reconnect attempts; dropping connection");
                            state.clear_snapshot_store().await;
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "snapshot store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Local writes stay held back until a pull succeeds, so a failure here only
/// delays them until the next poll.
fn report_resync(result: Result<SyncReport, ServiceError>) {
    match result {
        Ok(report) => info!(?report, "resynchronised with snapshot store"),
        Err(err) => warn!(error = %err, "resync with snapshot store failed; retrying on next poll"),
    }
}

/// Forward degraded mode changes to connected UIs until the state is dropped.
pub async fn broadcast_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        info!(degraded, "degraded mode changed");
        sse_events::broadcast_system_status(&state, degraded);
    }
}
