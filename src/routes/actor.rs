use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::state::SharedState;

/// Header naming the person performing a request.
pub const ACTOR_HEADER: &str = "x-actor";

/// Person performing the request, recorded in audit stamps and messages.
///
/// Read from [`ACTOR_HEADER`] (UTF-8, trimmed), falling back to the configured
/// default actor.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

impl FromRequestParts<SharedState> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| state.config().default_actor().to_string());
        Ok(Actor(actor))
    }
}
