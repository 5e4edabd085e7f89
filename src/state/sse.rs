use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Events buffered per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Fan-out of board, resource and system events to connected UIs.
///
/// Every event is a full snapshot or a self-contained notice, so a lagging
/// subscriber only needs the next one to catch up.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl Default for SseHub {
    fn default() -> Self {
        let (sender, _receiver) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }
}

impl SseHub {
    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to every subscriber. Having none is not an error.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
