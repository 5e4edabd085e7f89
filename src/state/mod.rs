pub mod board;
pub mod resource;
pub mod roster;
pub mod rotation;
mod sse;

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use tokio::sync::{Mutex, RwLock, mpsc, watch};

use crate::{
    config::AppConfig,
    dao::{
        models::{ResourceRecord, RotationRecord},
        snapshot_store::SnapshotStore,
    },
    error::ServiceError,
    state::{board::Board, resource::ResourceLock},
};

pub use self::sse::SseHub;

/// Handle shared by every task and handler of a replica.
pub type SharedState = Arc<AppState>;

/// One of the two remote slots a replica reads and overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Queues, statuses and flags.
    Rotation,
    /// Shared-resource lock and message log.
    Resource,
}

/// Snapshot waiting to be written to the remote store.
#[derive(Debug, Clone)]
pub enum PersistJob {
    /// Overwrite the rotation slot.
    Rotation(RotationRecord),
    /// Overwrite the shared-resource slot.
    Resource(ResourceRecord),
}

impl PersistJob {
    /// Slot this job overwrites.
    pub fn slot(&self) -> Slot {
        match self {
            PersistJob::Rotation(_) => Slot::Rotation,
            PersistJob::Resource(_) => Slot::Resource,
        }
    }
}

#[derive(Debug, Default)]
struct SlotWrites {
    in_flight: AtomicUsize,
    generation: AtomicU64,
    synced: AtomicBool,
}

/// Local write bookkeeping per slot: writes accepted but not yet attempted,
/// a generation bumped on every accepted write, and whether the remote slot
/// has been observed since the store was (re)attached.
#[derive(Debug, Default)]
pub struct PendingWrites {
    rotation: SlotWrites,
    resource: SlotWrites,
}

impl PendingWrites {
    fn slot(&self, slot: Slot) -> &SlotWrites {
        match slot {
            Slot::Rotation => &self.rotation,
            Slot::Resource => &self.resource,
        }
    }

    /// True while a rotation write is queued or running.
    pub fn rotation_in_flight(&self) -> bool {
        self.in_flight(Slot::Rotation)
    }

    /// True while a resource write is queued or running.
    pub fn resource_in_flight(&self) -> bool {
        self.in_flight(Slot::Resource)
    }

    /// True while a write to `slot` is queued or running.
    pub fn in_flight(&self, slot: Slot) -> bool {
        self.slot(slot).in_flight.load(Ordering::Acquire) > 0
    }

    /// Number of writes ever accepted for `slot`.
    pub fn generation(&self, slot: Slot) -> u64 {
        self.slot(slot).generation.load(Ordering::Acquire)
    }

    /// Whether local writes to `slot` may reach the store.
    pub fn is_synced(&self, slot: Slot) -> bool {
        self.slot(slot).synced.load(Ordering::Acquire)
    }

    /// Record that the local copy of `slot` matches what the store holds.
    pub fn mark_synced(&self, slot: Slot) {
        self.slot(slot).synced.store(true, Ordering::Release);
    }

    /// Hold back local writes until both slots are observed again.
    pub fn mark_unsynced(&self) {
        self.rotation.synced.store(false, Ordering::Release);
        self.resource.synced.store(false, Ordering::Release);
    }

    fn accept(&self, slot: Slot) {
        let writes = self.slot(slot);
        writes.in_flight.fetch_add(1, Ordering::AcqRel);
        writes.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark a job as settled, whatever its outcome.
    pub fn settle(&self, job: &PersistJob) {
        self.slot(job.slot()).in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Replica state: the local copies of the board and resource lock, the remote
/// store handle, and the fan-out hub feeding connected UIs.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn SnapshotStore>>>,
    board: RwLock<Board>,
    resource: RwLock<ResourceLock>,
    sse: SseHub,
    degraded: watch::Sender<bool>,
    pending: PendingWrites,
    persist_tx: mpsc::UnboundedSender<PersistJob>,
    persist_rx: Mutex<Option<mpsc::UnboundedReceiver<PersistJob>>>,
    http: reqwest::Client,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The replica starts in degraded mode until a snapshot store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            board: RwLock::new(Board::default()),
            resource: RwLock::new(ResourceLock::default()),
            sse: SseHub::default(),
            degraded: degraded_tx,
            pending: PendingWrites::default(),
            persist_tx,
            persist_rx: Mutex::new(Some(persist_rx)),
            http: reqwest::Client::new(),
        })
    }

    /// Runtime configuration, including the roster.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current snapshot store, if one is installed.
    pub async fn snapshot_store(&self) -> Option<Arc<dyn SnapshotStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`Self::snapshot_store`] but failing while degraded.
    pub async fn require_snapshot_store(&self) -> Result<Arc<dyn SnapshotStore>, ServiceError> {
        self.snapshot_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a snapshot store implementation and leave degraded mode.
    ///
    /// Local writes stay held back until the next pull observes both slots.
    pub async fn install_snapshot_store(&self, store: Arc<dyn SnapshotStore>) {
        self.pending.mark_unsynced();
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current snapshot store and enter degraded mode.
    pub async fn clear_snapshot_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when it changes.
    ///
    /// Entering degraded mode holds back local writes until the next pull.
    pub fn update_degraded(&self, value: bool) {
        if value {
            self.pending.mark_unsynced();
        }
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Local rotation snapshot.
    pub fn board(&self) -> &RwLock<Board> {
        &self.board
    }

    /// Local shared-resource snapshot.
    pub fn resource(&self) -> &RwLock<ResourceLock> {
        &self.resource
    }

    /// Broadcast hub used for the UI event stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Writes accepted locally and not yet attempted remotely.
    pub fn pending_writes(&self) -> &PendingWrites {
        &self.pending
    }

    /// Client used for outbound notifications.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Queue a snapshot for the persistence writer. Never blocks.
    ///
    /// Callers hold the lock of the slot being written. A slot not observed
    /// remotely since the store was attached is never written: the change
    /// stays local and the next pull replaces it.
    pub fn enqueue_persist(&self, job: PersistJob) {
        let slot = job.slot();
        if !self.pending.is_synced(slot) {
            tracing::warn!(?slot, "remote snapshot not observed yet; local change not persisted");
            return;
        }
        self.pending.accept(slot);
        if let Err(mpsc::error::SendError(job)) = self.persist_tx.send(job) {
            self.pending.settle(&job);
            tracing::warn!("persistence writer is gone; dropping snapshot write");
        }
    }

    /// Hand the persistence queue to its writer. Returns `None` once taken.
    pub async fn take_persist_queue(&self) -> Option<mpsc::UnboundedReceiver<PersistJob>> {
        self.persist_rx.lock().await.take()
    }
}
