//! Baton Back binary entrypoint wiring REST, SSE, synchronization and the snapshot store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use baton_back::{
    config::AppConfig,
    dao::snapshot_store::memory::MemorySnapshotStore,
    routes,
    services::{persistence, storage_supervisor, sync_service},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());

    persistence::spawn_writer(app_state.clone());
    tokio::spawn(storage_supervisor::broadcast_degraded_changes(
        app_state.clone(),
    ));
    start_snapshot_store(app_state.clone()).await;
    sync_service::spawn(app_state.clone());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Supervise a CouchDB store when one is configured, otherwise run on an
/// in-process memory store.
async fn start_snapshot_store(state: SharedState) {
    #[cfg(feature = "couch-store")]
    {
        use baton_back::dao::{
            snapshot_store::{
                SnapshotStore,
                couchdb::{CouchConfig, CouchSnapshotStore},
            },
            storage::StorageError,
        };

        match CouchConfig::from_env() {
            Ok(config) => {
                info!(
                    base_url = %config.base_url,
                    database = %config.database,
                    "using CouchDB snapshot store"
                );
                tokio::spawn(storage_supervisor::run(state, move || {
                    let config = config.clone();
                    async move {
                        CouchSnapshotStore::connect(config)
                            .await
                            .map(|store| Arc::new(store) as Arc<dyn SnapshotStore>)
                            .map_err(StorageError::from)
                    }
                }));
                return;
            }
            Err(err) => info!(reason = %err, "CouchDB not configured"),
        }
    }

    info!("using in-process memory snapshot store");
    if let Err(err) = sync_service::attach(&state, Arc::new(MemorySnapshotStore::new())).await {
        warn!(error = %err, "initial pull from memory store failed");
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
