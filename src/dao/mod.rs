/// Persisted record shapes shared by every backend.
pub mod models;
/// Remote store holding the shared slots.
pub mod snapshot_store;
/// Storage abstraction layer for database operations.
pub mod storage;
