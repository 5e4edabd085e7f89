#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::{future::BoxFuture, stream::BoxStream};
use time::OffsetDateTime;

use crate::{
    dao::{
        models::{ResourceRecord, RotationRecord},
        storage::StorageResult,
    },
    state::roster::Team,
};

/// A slot written by some replica, as delivered by the change subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// The rotation slot was overwritten.
    Rotation(RotationRecord),
    /// The shared-resource slot was overwritten.
    Resource(ResourceRecord),
}

/// Abstraction over the remote store holding the two shared slots.
///
/// Saves are blind overwrites of the whole slot: the last write to land wins.
pub trait SnapshotStore: Send + Sync {
    /// Read the rotation slot; `None` until some replica writes it.
    fn load_rotation(&self) -> BoxFuture<'static, StorageResult<Option<RotationRecord>>>;
    /// Overwrite the rotation slot.
    fn save_rotation(&self, record: RotationRecord) -> BoxFuture<'static, StorageResult<()>>;
    /// Read the shared-resource slot; `None` until some replica writes it.
    fn load_resource(&self) -> BoxFuture<'static, StorageResult<Option<ResourceRecord>>>;
    /// Overwrite the shared-resource slot.
    fn save_resource(&self, record: ResourceRecord) -> BoxFuture<'static, StorageResult<()>>;
    /// Increment the per-day count of tokens assumed by `person`.
    fn record_token_assumed(
        &self,
        person: String,
        team: Team,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Stream of slot writes made by any replica, starting from now.
    fn subscribe(&self) -> BoxStream<'static, StorageResult<RemoteChange>>;
    /// Cheap round trip proving the store is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
