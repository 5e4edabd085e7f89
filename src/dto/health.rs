use serde::Serialize;
use utoipa::ToSchema;

/// Health report returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when a snapshot store is reachable, `degraded` otherwise.
    pub status: String,
    /// Connected board stream clients.
    pub sse_clients: usize,
    /// Whether local changes are still waiting to reach the store.
    pub writes_pending: bool,
}

impl HealthResponse {
    /// Build a report from the replica's current condition.
    pub fn new(degraded: bool, sse_clients: usize, writes_pending: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            sse_clients,
            writes_pending,
        }
    }
}
