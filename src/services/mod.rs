/// Rotation mutations and read models.
pub mod board_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Side effects of token passes: daily tally and automation webhook.
pub mod notification_service;
/// Background writer pushing local snapshots to the store.
pub mod persistence;
/// Shared resource lock and message log.
pub mod resource_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Push and pull reconciliation with the remote store.
pub mod sync_service;
