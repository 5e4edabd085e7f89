//! Several replicas sharing one memory store.

use std::{sync::Arc, time::Duration};

use baton_back::{
    config::AppConfig,
    dao::snapshot_store::{SnapshotStore, memory::MemorySnapshotStore},
    dto::{
        board::SetStatusRequest,
        resource::{ReleaseRequestBody, ResourcePersonRequest},
    },
    services::{board_service, persistence, resource_service, sync_service},
    state::{
        AppState, SharedState,
        board::{Board, UNAVAILABLE},
        roster::{Roster, Team},
    },
};
use time::OffsetDateTime;

fn roster() -> Roster {
    Roster::new([
        ("Ana", Some(Team::Eproc)),
        ("Bruno", Some(Team::Eproc)),
        ("Carla", Some(Team::Eproc)),
        ("Diego", Some(Team::Jpe)),
        ("Eva", Some(Team::Jpe)),
        ("Fabio", Some(Team::Jpe)),
        ("Gilberto", None),
    ])
}

/// Replica attached to `store` with its writer running; loops are driven by hand.
async fn replica(store: &MemorySnapshotStore) -> SharedState {
    let state = AppState::new(AppConfig::with_roster(roster()));
    persistence::spawn_writer(state.clone());
    sync_service::attach(&state, Arc::new(store.clone()))
        .await
        .unwrap();
    state
}

async fn settled(state: &SharedState) {
    for _ in 0..200 {
        let pending = state.pending_writes();
        if !pending.rotation_in_flight() && !pending.resource_in_flight() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("writes never settled");
}

async fn queue(state: &SharedState, team: Team) -> Vec<String> {
    state.board().read().await.queue(team).to_vec()
}

fn status(label: &str, keep_in_queue: bool) -> SetStatusRequest {
    SetStatusRequest {
        label: label.into(),
        keep_in_queue,
        detail: String::new(),
    }
}

async fn seed_eproc(state: &SharedState, people: &[&str]) {
    for person in people {
        board_service::toggle_queue(state, person, person)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn scenario_skip_is_consumed_once() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;
    seed_eproc(&state, &["Ana", "Bruno", "Carla"]).await;

    board_service::toggle_skip(&state, "Ana", "Bruno").await.unwrap();
    board_service::pass_token(&state, "Ana", "EPROC").await.unwrap();

    assert_eq!(queue(&state, Team::Eproc).await, vec!["Carla", "Ana", "Bruno"]);
    assert!(!state.board().read().await.skip_of("Bruno"));
}

#[tokio::test]
async fn scenario_unavailable_then_back_in_queue() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;
    board_service::toggle_queue(&state, "Diego", "Diego")
        .await
        .unwrap();
    board_service::toggle_queue(&state, "Eva", "Eva").await.unwrap();

    board_service::set_status(&state, "Diego", "Diego", status(UNAVAILABLE, true))
        .await
        .unwrap();
    assert_eq!(queue(&state, Team::Jpe).await, vec!["Eva"]);

    board_service::set_status(&state, "Diego", "Diego", status("", true))
        .await
        .unwrap();
    assert_eq!(queue(&state, Team::Jpe).await, vec!["Eva", "Diego"]);
    assert_eq!(state.board().read().await.status_of("Diego"), "");
}

#[tokio::test]
async fn scenario_release_request_only_logs() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;

    resource_service::acquire(&state, "Eva", ResourcePersonRequest::default())
        .await
        .unwrap();
    let view = resource_service::request_release(
        &state,
        "Fabio",
        ReleaseRequestBody {
            from: Some("Fabio".into()),
            to: Some("Eva".into()),
        },
    )
    .await
    .unwrap();

    assert!(view.in_use);
    assert_eq!(view.holder.as_deref(), Some("Eva"));
    assert_eq!(view.messages[0].author, "Fabio");
    assert!(view.messages[0].text.contains("Eva"));

    settled(&state).await;
    let stored = store.load_resource().await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn replicas_converge_through_push_and_pull() {
    let store = MemorySnapshotStore::new();
    let first = replica(&store).await;
    let second = replica(&store).await;

    seed_eproc(&first, &["Ana", "Bruno"]).await;
    settled(&first).await;
    sync_service::pull(&second).await.unwrap();
    assert_eq!(queue(&second, Team::Eproc).await, vec!["Ana", "Bruno"]);

    // Concurrent edits: both apply locally, the later stamp wins everywhere.
    board_service::toggle_skip(&first, "Ana", "Ana").await.unwrap();
    board_service::pass_token(&second, "Bruno", "EPROC")
        .await
        .unwrap();
    settled(&first).await;
    settled(&second).await;

    sync_service::pull(&first).await.unwrap();
    sync_service::pull(&second).await.unwrap();

    let left = first.board().read().await.clone();
    let right = second.board().read().await.clone();
    assert_eq!(left, right);
    assert_eq!(
        Some(left),
        store.load_rotation().await.unwrap().map(Board::from)
    );
}

#[tokio::test]
async fn push_loop_delivers_remote_mutations() {
    let store = MemorySnapshotStore::new();
    let writer = replica(&store).await;
    let reader = replica(&store).await;
    sync_service::spawn(reader.clone());
    // Let the push loop subscribe before anything is written.
    tokio::time::sleep(Duration::from_millis(50)).await;

    seed_eproc(&writer, &["Ana", "Bruno", "Carla"]).await;
    board_service::pass_token(&writer, "Ana", "EPROC")
        .await
        .unwrap();
    settled(&writer).await;

    for _ in 0..200 {
        if queue(&reader, Team::Eproc).await == ["Bruno", "Carla", "Ana"] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(queue(&reader, Team::Eproc).await, vec!["Bruno", "Carla", "Ana"]);
    assert_eq!(
        reader.board().read().await.last_mutation,
        writer.board().read().await.last_mutation
    );
}

#[tokio::test]
async fn failed_persist_reverts_on_next_pull() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;
    seed_eproc(&state, &["Ana", "Bruno"]).await;
    settled(&state).await;

    store.set_offline(true);
    board_service::pass_token(&state, "Ana", "EPROC").await.unwrap();
    assert_eq!(queue(&state, Team::Eproc).await, vec!["Bruno", "Ana"]);
    settled(&state).await;
    store.set_offline(false);

    let report = sync_service::pull(&state).await.unwrap();
    assert!(report.rotation_adopted);
    assert_eq!(queue(&state, Team::Eproc).await, vec!["Ana", "Bruno"]);
}

#[tokio::test]
async fn people_without_team_never_queue() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;

    let view = board_service::toggle_queue(&state, "Ana", "Gilberto")
        .await
        .unwrap();
    assert!(view.last_mutation.is_none());

    board_service::set_status(&state, "Gilberto", "Gilberto", status("", true))
        .await
        .unwrap();
    let board = state.board().read().await.clone();
    assert!(!board.is_queued("Gilberto"));
    assert_eq!(board.status_of("Gilberto"), "");
}

#[tokio::test]
async fn queues_stay_disjoint_and_unique() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;
    seed_eproc(&state, &["Ana", "Bruno"]).await;
    board_service::set_status(&state, "Ana", "Ana", status("Atendimento", true))
        .await
        .unwrap();
    board_service::set_status(&state, "Ana", "Ana", status("", true))
        .await
        .unwrap();
    board_service::toggle_queue(&state, "Diego", "Diego")
        .await
        .unwrap();

    let board = state.board().read().await.clone();
    let mut all: Vec<&String> = board.queue_eproc.iter().chain(&board.queue_jpe).collect();
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total);
    assert_eq!(board.queue_eproc, vec!["Ana", "Bruno"]);
}

#[tokio::test]
async fn token_pass_records_daily_tally() {
    let store = MemorySnapshotStore::new();
    let state = replica(&store).await;
    seed_eproc(&state, &["Ana", "Bruno"]).await;
    board_service::pass_token(&state, "Ana", "EPROC").await.unwrap();

    let today = OffsetDateTime::now_utc();
    for _ in 0..200 {
        if store.tally("Bruno", today).await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let tally = store.tally("Bruno", today).await.unwrap();
    assert_eq!(tally.tokens_assumed, 1);
    assert_eq!(tally.team, Team::Eproc);
}

#[tokio::test]
async fn joining_replica_builds_on_the_stored_queue() {
    let store = MemorySnapshotStore::new();
    let first = replica(&store).await;
    seed_eproc(&first, &["Ana", "Bruno"]).await;
    settled(&first).await;

    let second = replica(&store).await;
    assert_eq!(queue(&second, Team::Eproc).await, vec!["Ana", "Bruno"]);
    board_service::toggle_queue(&second, "Carla", "Carla")
        .await
        .unwrap();
    settled(&second).await;

    let stored = store.load_rotation().await.unwrap().unwrap();
    assert_eq!(stored.queue_eproc, vec!["Ana", "Bruno", "Carla"]);
}

#[tokio::test]
async fn replica_never_overwrites_a_store_it_has_not_read() {
    let store = MemorySnapshotStore::new();
    let first = replica(&store).await;
    seed_eproc(&first, &["Ana", "Bruno"]).await;
    settled(&first).await;

    let second = AppState::new(AppConfig::with_roster(roster()));
    persistence::spawn_writer(second.clone());
    second
        .install_snapshot_store(Arc::new(store.clone()))
        .await;
    board_service::toggle_queue(&second, "Carla", "Carla")
        .await
        .unwrap();
    settled(&second).await;

    let stored = store.load_rotation().await.unwrap().unwrap();
    assert_eq!(stored.queue_eproc, vec!["Ana", "Bruno"]);

    let report = sync_service::pull(&second).await.unwrap();
    assert!(report.rotation_adopted);
    assert_eq!(queue(&second, Team::Eproc).await, vec!["Ana", "Bruno"]);
}
