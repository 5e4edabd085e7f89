use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        board::BoardView,
        resource::ResourceView,
        sse::{Handshake, ServerEvent},
    },
    services::sse_events::{EVENT_BOARD_SNAPSHOT, EVENT_RESOURCE_SNAPSHOT},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the board stream, returning the receiver together with the
/// events that bring a fresh client up to date.
pub async fn subscribe_board(
    state: &SharedState,
) -> (broadcast::Receiver<ServerEvent>, Vec<ServerEvent>) {
    // Subscribe first so nothing broadcast while building the snapshots is lost.
    let receiver = state.sse().subscribe();

    let handshake = Handshake {
        stream: "board".into(),
        message: "board stream connected".into(),
        degraded: state.is_degraded(),
    };
    let board = BoardView::from(&*state.board().read().await);
    let resource = ResourceView::from(&*state.resource().read().await);

    let initial: Vec<ServerEvent> = [
        ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake),
        ServerEvent::json(Some(EVENT_BOARD_SNAPSHOT.to_string()), &board),
        ServerEvent::json(Some(EVENT_RESOURCE_SNAPSHOT.to_string()), &resource),
    ]
    .into_iter()
    .filter_map(|event| {
        event
            .map_err(|err| warn!(error = %err, "failed to serialize initial SSE payload"))
            .ok()
    })
    .collect();

    (receiver, initial)
}

/// Convert a broadcast receiver into an SSE response, replaying `initial`
/// first and forwarding events until the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Snapshots are complete, the next one catches the client up.
                            warn!(skipped, "board SSE client lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!("board SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
