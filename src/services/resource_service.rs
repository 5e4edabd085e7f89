use time::OffsetDateTime;
use tracing::info;

use crate::{
    dao::models::ResourceRecord,
    dto::resource::{PostMessageRequest, ReleaseRequestBody, ResourcePersonRequest, ResourceView},
    error::ServiceError,
    services::sse_events,
    state::{PersistJob, SharedState, resource::ResourceLock},
};

/// Current shared resource state and message log.
pub async fn resource_view(state: &SharedState) -> ResourceView {
    ResourceView::from(&*state.resource().read().await)
}

/// Hand the shared resource to the requested person, or to the actor.
pub async fn acquire(
    state: &SharedState,
    actor: &str,
    request: ResourcePersonRequest,
) -> Result<ResourceView, ServiceError> {
    let person = request.person.unwrap_or_else(|| actor.to_string());
    ensure_known(state, &person)?;
    let lock = update(state, |lock, now| lock.acquire(&person, actor, now)).await;
    info!(actor, holder = %person, "shared resource acquired");
    Ok(lock)
}

/// Free the shared resource on behalf of the requested person, or the actor.
pub async fn release(
    state: &SharedState,
    actor: &str,
    request: ResourcePersonRequest,
) -> Result<ResourceView, ServiceError> {
    let person = request.person.unwrap_or_else(|| actor.to_string());
    ensure_known(state, &person)?;
    let lock = update(state, |lock, now| lock.release(&person, actor, now)).await;
    info!(actor, person = %person, "shared resource released");
    Ok(lock)
}

/// Log a request asking the holder to free the resource.
pub async fn request_release(
    state: &SharedState,
    actor: &str,
    body: ReleaseRequestBody,
) -> Result<ResourceView, ServiceError> {
    let from = body.from.unwrap_or_else(|| actor.to_string());
    let to = match body.to {
        Some(to) => to,
        None => state
            .resource()
            .read()
            .await
            .holder
            .clone()
            .ok_or_else(|| ServiceError::InvalidInput("the shared resource is not held".into()))?,
    };
    ensure_known(state, &from)?;
    ensure_known(state, &to)?;
    let lock = update(state, |lock, now| lock.request_release(&from, &to, now)).await;
    info!(from = %from, to = %to, "release requested");
    Ok(lock)
}

/// Prepend a free-form message to the shared log.
pub async fn post_message(
    state: &SharedState,
    actor: &str,
    request: PostMessageRequest,
) -> Result<ResourceView, ServiceError> {
    let author = request.author.unwrap_or_else(|| actor.to_string());
    let text = request.text;
    let category = request.category;
    Ok(update(state, |lock, now| lock.with_message(text, category, &author, now)).await)
}

fn ensure_known(state: &SharedState, person: &str) -> Result<(), ServiceError> {
    if state.config().roster().contains(person) {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("person `{person}`")))
    }
}

async fn update<F>(state: &SharedState, change: F) -> ResourceView
where
    F: FnOnce(&ResourceLock, OffsetDateTime) -> ResourceLock,
{
    let next = {
        let mut guard = state.resource().write().await;
        let next = change(&guard, OffsetDateTime::now_utc());
        *guard = next.clone();
        state.enqueue_persist(PersistJob::Resource(ResourceRecord::from(&next)));
        next
    };

    sse_events::broadcast_resource(state, &next);
    ResourceView::from(&next)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::snapshot_store::memory::MemorySnapshotStore,
        services::sync_service,
        state::{
            AppState,
            resource::MessageCategory,
            roster::{Roster, Team},
        },
    };

    /// Replica attached to an empty memory store, writer not running.
    async fn state() -> SharedState {
        let state = AppState::new(AppConfig::with_roster(Roster::new([
            ("Eva", Some(Team::Eproc)),
            ("Fabio", Some(Team::Jpe)),
            ("Gilberto", None),
        ])));
        sync_service::attach(&state, Arc::new(MemorySnapshotStore::new()))
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn request_release_keeps_holder() {
        let state = state().await;
        acquire(&state, "Eva", ResourcePersonRequest::default())
            .await
            .unwrap();
        let view = request_release(
            &state,
            "Fabio",
            ReleaseRequestBody {
                from: None,
                to: None,
            },
        )
        .await
        .unwrap();

        assert!(view.in_use);
        assert_eq!(view.holder.as_deref(), Some("Eva"));
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].author, "Fabio");
        assert!(view.messages[0].text.contains("Eva"));
        assert!(state.pending_writes().resource_in_flight());
    }

    #[tokio::test]
    async fn request_release_needs_a_holder() {
        let state = state().await;
        let result = request_release(
            &state,
            "Fabio",
            ReleaseRequestBody {
                from: None,
                to: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn acquire_for_someone_else_and_release() {
        let state = state().await;
        let view = acquire(
            &state,
            "Gilberto",
            ResourcePersonRequest {
                person: Some("Eva".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(view.holder.as_deref(), Some("Eva"));
        assert_eq!(view.messages[0].author, "Gilberto");

        let view = release(&state, "Eva", ResourcePersonRequest::default())
            .await
            .unwrap();
        assert!(!view.in_use);
        assert!(view.messages[0].text.ends_with("(1 min)"));
    }

    #[tokio::test]
    async fn unknown_people_are_rejected() {
        let state = state().await;
        let result = acquire(&state, "Stranger", ResourcePersonRequest::default()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn messages_default_to_actor() {
        let state = state().await;
        let view = post_message(
            &state,
            "Fabio",
            PostMessageRequest {
                text: "servidor reiniciado".into(),
                category: MessageCategory::Common,
                author: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(view.messages[0].author, "Fabio");
        assert_eq!(view.messages[0].category, MessageCategory::Common);
    }
}
