use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod actor;
pub mod board;
pub mod health;
pub mod resource;
pub mod sse;
pub mod sync;

/// Compose all route trees, wiring in shared state and the Swagger UI.
pub fn router(state: SharedState) -> Router<()> {
    let docs: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    health::router()
        .merge(sse::router())
        .merge(board::router())
        .merge(resource::router())
        .merge(sync::router())
        .merge(docs)
        .with_state(state)
}
