use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::board::SyncReport, error::AppError, services::sync_service, state::SharedState,
};

/// Run one pull cycle now instead of waiting for the next tick.
#[utoipa::path(
    post,
    path = "/sync/pull",
    tag = "sync",
    responses(
        (status = 200, description = "Slots adopted from the store", body = SyncReport),
        (status = 503, description = "No store connection")
    )
)]
pub async fn pull(State(state): State<SharedState>) -> Result<Json<SyncReport>, AppError> {
    Ok(Json(sync_service::pull(&state).await?))
}

/// Configure the synchronization routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sync/pull", post(pull))
}
