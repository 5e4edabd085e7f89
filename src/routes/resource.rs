use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::resource::{PostMessageRequest, ReleaseRequestBody, ResourcePersonRequest, ResourceView},
    error::AppError,
    routes::actor::Actor,
    services::resource_service,
    state::SharedState,
};

/// Routes for the shared resource lock and the message log.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/resource", get(get_resource))
        .route("/resource/acquire", post(acquire))
        .route("/resource/release", post(release))
        .route("/resource/release-request", post(request_release))
        .route("/messages", post(post_message))
}

/// Current holder and message log.
#[utoipa::path(
    get,
    path = "/resource",
    tag = "resource",
    responses((status = 200, description = "Shared resource state", body = ResourceView))
)]
pub async fn get_resource(State(state): State<SharedState>) -> Json<ResourceView> {
    Json(resource_service::resource_view(&state).await)
}

/// Take the shared resource, or hand it to someone.
#[utoipa::path(
    post,
    path = "/resource/acquire",
    tag = "resource",
    params(("x-actor" = Option<String>, Header, description = "Person performing the action")),
    request_body = ResourcePersonRequest,
    responses(
        (status = 200, description = "Resource acquired", body = ResourceView),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn acquire(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(payload): Json<ResourcePersonRequest>,
) -> Result<Json<ResourceView>, AppError> {
    payload.validate()?;
    Ok(Json(resource_service::acquire(&state, &actor, payload).await?))
}

/// Free the shared resource.
#[utoipa::path(
    post,
    path = "/resource/release",
    tag = "resource",
    params(("x-actor" = Option<String>, Header, description = "Person performing the action")),
    request_body = ResourcePersonRequest,
    responses(
        (status = 200, description = "Resource released", body = ResourceView),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn release(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(payload): Json<ResourcePersonRequest>,
) -> Result<Json<ResourceView>, AppError> {
    payload.validate()?;
    Ok(Json(resource_service::release(&state, &actor, payload).await?))
}

/// Ask the holder to free the resource. Only the log changes.
#[utoipa::path(
    post,
    path = "/resource/release-request",
    tag = "resource",
    params(("x-actor" = Option<String>, Header, description = "Person performing the action")),
    request_body = ReleaseRequestBody,
    responses(
        (status = 200, description = "Request logged", body = ResourceView),
        (status = 400, description = "Nobody holds the resource"),
        (status = 404, description = "Unknown person")
    )
)]
pub async fn request_release(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(payload): Json<ReleaseRequestBody>,
) -> Result<Json<ResourceView>, AppError> {
    payload.validate()?;
    Ok(Json(
        resource_service::request_release(&state, &actor, payload).await?,
    ))
}

/// Post a message to the shared log.
#[utoipa::path(
    post,
    path = "/messages",
    tag = "resource",
    params(("x-actor" = Option<String>, Header, description = "Person performing the action")),
    request_body = PostMessageRequest,
    responses(
        (status = 200, description = "Message logged", body = ResourceView),
        (status = 400, description = "Empty or oversized text, or invalid author name")
    )
)]
pub async fn post_message(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(payload): Json<PostMessageRequest>,
) -> Result<Json<ResourceView>, AppError> {
    payload.validate()?;
    Ok(Json(
        resource_service::post_message(&state, &actor, payload).await?,
    ))
}
