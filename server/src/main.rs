mod app;
mod config;
mod overlay;
mod routes;
mod services;
mod share;
mod state;
mod views;

use suggestion_map_shared::{MapScope, Topology};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::services::search_orchestrator::SearchOutcome;
use crate::state::{AppState, StateSettings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let topology_path = config::topology_path();
    let topology = match load_topology(&topology_path).await {
        Ok(topology) => topology,
        Err(e) => {
            tracing::error!(error = %e, path = %topology_path, "failed to load map topology");
            return;
        }
    };

    let settings = StateSettings::from_env();
    let state = match AppState::new(topology, settings.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to build application state");
            return;
        }
    };
    for scope in [MapScope::National, MapScope::World] {
        tracing::info!(
            %scope,
            regions = state.catalog.regions_for_scope(&scope).len(),
            "loaded region catalog"
        );
    }

    // Populate the default map so the first visitor sees labels.
    tokio::spawn(initial_search(
        state.clone(),
        settings.default_query,
        settings.default_scope,
    ));

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Suggestion map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn load_topology(path: &str) -> Result<Topology, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("failed to read {path}: {e}"))?;
    Topology::from_json(&bytes).map_err(|e| format!("failed to parse {path}: {e}"))
}

async fn initial_search(state: AppState, query: String, scope: MapScope) {
    match state.orchestrator.run_search(&query, &scope).await {
        Ok(SearchOutcome::Published(published)) => {
            tracing::info!(
                %scope,
                generation = published.generation,
                "initial labels ready"
            );
        }
        Ok(SearchOutcome::Superseded { generation, .. }) => {
            tracing::debug!(%scope, generation, "initial search superseded by a request");
        }
        // Already logged by the orchestrator; the map stays unlabelled.
        Err(_) => {}
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
