use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    dao::models::RotationRecord,
    dto::board::{BoardView, RosterView, SetStatusRequest, validate_person},
    error::ServiceError,
    state::{
        PersistJob, SharedState,
        board::{AuditStamp, Board, Indicator, Mutation},
        roster::Team,
    },
    services::{notification_service, sse_events},
};

/// Current rotation snapshot.
pub async fn board_view(state: &SharedState) -> BoardView {
    BoardView::from(&*state.board().read().await)
}

/// Static roster with team assignments.
pub fn roster_view(state: &SharedState) -> RosterView {
    RosterView::from(state.config().roster())
}

/// Rotate the token of `team` to the next eligible person.
pub async fn pass_token(
    state: &SharedState,
    actor: &str,
    team: &str,
) -> Result<BoardView, ServiceError> {
    let team = team.parse::<Team>()?;
    apply(state, actor, Mutation::PassToken { team }).await
}

/// Add or remove a person from their team queue.
pub async fn toggle_queue(
    state: &SharedState,
    actor: &str,
    person: &str,
) -> Result<BoardView, ServiceError> {
    let person = known_person(state, person)?;
    apply(state, actor, Mutation::ToggleQueue { person }).await
}

/// Set the status label, detail and queue presence of a person.
pub async fn set_status(
    state: &SharedState,
    actor: &str,
    person: &str,
    request: SetStatusRequest,
) -> Result<BoardView, ServiceError> {
    let person = known_person(state, person)?;
    let mutation = Mutation::SetStatus {
        person,
        label: request.label.trim().to_string(),
        keep_in_queue: request.keep_in_queue,
        detail: request.detail,
    };
    apply(state, actor, mutation).await
}

/// Flip the phone or break indicator of a person.
pub async fn toggle_indicator(
    state: &SharedState,
    actor: &str,
    person: &str,
    which: &str,
) -> Result<BoardView, ServiceError> {
    let person = known_person(state, person)?;
    let which = which
        .parse::<Indicator>()
        .map_err(ServiceError::InvalidInput)?;
    apply(state, actor, Mutation::ToggleIndicator { person, which }).await
}

/// Flip the one-shot skip flag of a person.
pub async fn toggle_skip(
    state: &SharedState,
    actor: &str,
    person: &str,
) -> Result<BoardView, ServiceError> {
    let person = known_person(state, person)?;
    apply(state, actor, Mutation::ToggleSkip { person }).await
}

fn known_person(state: &SharedState, person: &str) -> Result<String, ServiceError> {
    validate_person(person).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    if !state.config().roster().contains(person) {
        return Err(ServiceError::NotFound(format!("person `{person}`")));
    }
    Ok(person.to_string())
}

/// Apply a mutation locally, stamp it, fan it out and queue it for persistence.
///
/// The new snapshot is queued while the board lock is held, so the writer sees
/// snapshots in the order they were applied. No-op mutations leave the board
/// and its stamp untouched.
pub async fn apply(
    state: &SharedState,
    actor: &str,
    mutation: Mutation,
) -> Result<BoardView, ServiceError> {
    let roster = state.config().roster();

    let (board, description, token_passed) = {
        let mut guard = state.board().write().await;
        let Some(outcome) = guard.apply(&mutation, roster) else {
            debug!(?mutation, "mutation had no effect");
            return Ok(BoardView::from(&*guard));
        };

        let stamp = AuditStamp::after(
            guard.last_mutation.as_ref(),
            actor,
            outcome.description.as_str(),
            OffsetDateTime::now_utc(),
        );
        let next: Board = outcome.board.stamped(stamp);
        *guard = next.clone();
        state.enqueue_persist(PersistJob::Rotation(RotationRecord::from(&next)));
        (next, outcome.description, outcome.token_passed)
    };

    info!(actor, %description, "mutation applied");
    sse_events::broadcast_board(state, &board);
    if let Some(passed) = token_passed {
        sse_events::broadcast_token_passed(state, &passed);
        notification_service::announce_token_passed(state, passed);
    }

    Ok(BoardView::from(&board))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::snapshot_store::memory::MemorySnapshotStore,
        services::sync_service,
        state::{AppState, roster::Roster},
    };

    /// Replica attached to an empty memory store, writer not running.
    async fn state() -> SharedState {
        let state = AppState::new(AppConfig::with_roster(Roster::new([
            ("Ana", Some(Team::Eproc)),
            ("Bruno", Some(Team::Eproc)),
            ("Diego", Some(Team::Jpe)),
            ("Gilberto", None),
        ])));
        sync_service::attach(&state, Arc::new(MemorySnapshotStore::new()))
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn mutation_stamps_and_queues_persistence() {
        let state = state().await;
        let view = toggle_queue(&state, "Ana", "Ana").await.unwrap();
        assert_eq!(view.queues[0].members, vec!["Ana"]);

        let audit = view.last_mutation.unwrap();
        assert_eq!(audit.actor, "Ana");
        assert!(state.pending_writes().rotation_in_flight());
    }

    #[tokio::test]
    async fn noop_mutation_keeps_stamp_and_skips_persistence() {
        let state = state().await;
        let view = toggle_queue(&state, "Ana", "Gilberto").await.unwrap();
        assert!(view.last_mutation.is_none());
        assert!(!state.pending_writes().rotation_in_flight());

        let view = pass_token(&state, "Ana", "eproc").await.unwrap();
        assert!(view.last_mutation.is_none());
    }

    #[tokio::test]
    async fn stamps_increase_across_mutations() {
        let state = state().await;
        toggle_queue(&state, "Ana", "Ana").await.unwrap();
        let first = state.board().read().await.last_mutation.clone().unwrap();
        toggle_skip(&state, "Ana", "Bruno").await.unwrap();
        let second = state.board().read().await.last_mutation.clone().unwrap();
        assert!(second.timestamp > first.timestamp);
        assert_eq!(second.description, "Skip Bruno");
    }

    #[tokio::test]
    async fn rejects_unknown_people_and_inputs() {
        let state = state().await;
        assert!(matches!(
            toggle_skip(&state, "Ana", "Stranger").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            toggle_skip(&state, "Ana", " ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            toggle_indicator(&state, "Ana", "Ana", "lunch").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            pass_token(&state, "Ana", "sales").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn pass_token_broadcasts_snapshot_and_holder() {
        let state = state().await;
        toggle_queue(&state, "Ana", "Ana").await.unwrap();
        toggle_queue(&state, "Ana", "Bruno").await.unwrap();

        let mut events = state.sse().subscribe();
        let view = pass_token(&state, "Ana", "EPROC").await.unwrap();
        assert_eq!(view.queues[0].holder.as_deref(), Some("Bruno"));

        let snapshot = events.recv().await.unwrap();
        assert_eq!(snapshot.event.as_deref(), Some("board.snapshot"));
        let passed = events.recv().await.unwrap();
        assert_eq!(passed.event.as_deref(), Some("token.passed"));
        assert!(passed.data.contains("\"holder\":\"Bruno\""));
    }
}
