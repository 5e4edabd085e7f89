use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Check the snapshot store and report the replica's condition.
///
/// A failing check is logged; degraded mode itself is driven by the storage
/// supervisor.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_snapshot_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "snapshot store health check failed");
            }
        }
        Err(_) => warn!("snapshot store unavailable (degraded mode)"),
    }

    let pending = state.pending_writes();
    HealthResponse::new(
        state.is_degraded(),
        state.sse().subscriber_count(),
        pending.rotation_in_flight() || pending.resource_in_flight(),
    )
}
