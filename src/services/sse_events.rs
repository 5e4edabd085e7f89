use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        board::{BoardView, TokenPassedEvent},
        resource::ResourceView,
        sse::{ServerEvent, SystemStatus},
    },
    state::{
        SharedState,
        board::{Board, TokenPassed},
        resource::ResourceLock,
    },
};

pub(crate) const EVENT_BOARD_SNAPSHOT: &str = "board.snapshot";
pub(crate) const EVENT_RESOURCE_SNAPSHOT: &str = "resource.snapshot";
const EVENT_TOKEN_PASSED: &str = "token.passed";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the full rotation snapshot.
pub fn broadcast_board(state: &SharedState, board: &Board) {
    send_event(state, EVENT_BOARD_SNAPSHOT, &BoardView::from(board));
}

/// Broadcast the shared resource state and its log.
pub fn broadcast_resource(state: &SharedState, lock: &ResourceLock) {
    send_event(state, EVENT_RESOURCE_SNAPSHOT, &ResourceView::from(lock));
}

/// Broadcast the new holder after an effective pass.
pub fn broadcast_token_passed(state: &SharedState, passed: &TokenPassed) {
    send_event(state, EVENT_TOKEN_PASSED, &TokenPassedEvent::from(passed));
}

/// Broadcast entering or leaving degraded mode.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
