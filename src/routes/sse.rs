use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/board",
    tag = "sse",
    responses((status = 200, description = "Board SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream board, resource and system events to connected UIs.
pub async fn board_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (receiver, initial) = sse_service::subscribe_board(&state).await;
    info!(
        subscribers = state.sse().subscriber_count(),
        "new board SSE connection"
    );
    sse_service::to_sse_stream(receiver, initial)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/board", get(board_stream))
}
