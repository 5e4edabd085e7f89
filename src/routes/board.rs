use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::board::{BoardView, RosterView, SetStatusRequest},
    error::AppError,
    routes::actor::Actor,
    services::board_service,
    state::SharedState,
};

/// Routes reading and mutating the rotation board.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/board", get(get_board))
        .route("/roster", get(get_roster))
        .route("/rotation/{team}/pass", post(pass_token))
        .route("/people/{person}/queue/toggle", post(toggle_queue))
        .route("/people/{person}/status", put(set_status))
        .route(
            "/people/{person}/indicators/{which}/toggle",
            post(toggle_indicator),
        )
        .route("/people/{person}/skip/toggle", post(toggle_skip))
}

/// Current queues, per-person maps and audit stamp.
#[utoipa::path(
    get,
    path = "/board",
    tag = "board",
    responses((status = 200, description = "Current rotation snapshot", body = BoardView))
)]
pub async fn get_board(State(state): State<SharedState>) -> Json<BoardView> {
    Json(board_service::board_view(&state).await)
}

/// Known people and their rotation team.
#[utoipa::path(
    get,
    path = "/roster",
    tag = "board",
    responses((status = 200, description = "Static roster", body = RosterView))
)]
pub async fn get_roster(State(state): State<SharedState>) -> Json<RosterView> {
    Json(board_service::roster_view(&state))
}

/// Hand the team token to the next eligible person.
#[utoipa::path(
    post,
    path = "/rotation/{team}/pass",
    tag = "board",
    params(
        ("team" = String, Path, description = "Team code (`EPROC` or `JPE`)"),
        ("x-actor" = Option<String>, Header, description = "Person performing the action")
    ),
    responses(
        (status = 200, description = "Board after the pass", body = BoardView),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn pass_token(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(team): Path<String>,
) -> Result<Json<BoardView>, AppError> {
    Ok(Json(board_service::pass_token(&state, &actor, &team).await?))
}

/// Add the person to, or remove them from, their team queue.
#[utoipa::path(
    post,
    path = "/people/{person}/queue/toggle",
    tag = "board",
    params(
        ("person" = String, Path, description = "Person name"),
        ("x-actor" = Option<String>, Header, description = "Person performing the action")
    ),
    responses(
        (status = 200, description = "Board after the toggle", body = BoardView),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn toggle_queue(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(person): Path<String>,
) -> Result<Json<BoardView>, AppError> {
    Ok(Json(
        board_service::toggle_queue(&state, &actor, &person).await?,
    ))
}

/// Set a status label and detail, optionally keeping the person queued.
#[utoipa::path(
    put,
    path = "/people/{person}/status",
    tag = "board",
    params(
        ("person" = String, Path, description = "Person name"),
        ("x-actor" = Option<String>, Header, description = "Person performing the action")
    ),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Board after the status change", body = BoardView),
        (status = 400, description = "Invalid label or detail"),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn set_status(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(person): Path<String>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<BoardView>, AppError> {
    payload.validate()?;
    Ok(Json(
        board_service::set_status(&state, &actor, &person, payload).await?,
    ))
}

/// Flip the phone or break indicator.
#[utoipa::path(
    post,
    path = "/people/{person}/indicators/{which}/toggle",
    tag = "board",
    params(
        ("person" = String, Path, description = "Person name"),
        ("which" = String, Path, description = "`phone` or `break`"),
        ("x-actor" = Option<String>, Header, description = "Person performing the action")
    ),
    responses(
        (status = 200, description = "Board after the toggle", body = BoardView),
        (status = 400, description = "Unknown indicator"),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn toggle_indicator(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path((person, which)): Path<(String, String)>,
) -> Result<Json<BoardView>, AppError> {
    Ok(Json(
        board_service::toggle_indicator(&state, &actor, &person, &which).await?,
    ))
}

/// Flip the one-shot skip flag.
#[utoipa::path(
    post,
    path = "/people/{person}/skip/toggle",
    tag = "board",
    params(
        ("person" = String, Path, description = "Person name"),
        ("x-actor" = Option<String>, Header, description = "Person performing the action")
    ),
    responses(
        (status = 200, description = "Board after the toggle", body = BoardView),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn toggle_skip(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(person): Path<String>,
) -> Result<Json<BoardView>, AppError> {
    Ok(Json(
        board_service::toggle_skip(&state, &actor, &person).await?,
    ))
}
