//! finderd — resource finder overlay node.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use finder_api::ApiState;
use finder_core::config::FinderConfig;
use finder_services::{
    CommunicationHandler, NeighborhoodManager, ResourceCache, ResourceCacheUpdater, SearchCache,
};

mod probe;
mod transport;

use probe::HttpResourceProbe;
use transport::HttpTransport;

fn load_config() -> Result<FinderConfig> {
    // An explicit path on the command line wins over the default location.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let mut config = FinderConfig::from_file(Path::new(&path))?;
            config.apply_env_overrides();
            config
        }
        None => {
            if let Err(e) = FinderConfig::write_default_if_missing() {
                tracing::warn!(error = %e, "failed to write default config");
            }
            FinderConfig::load().context("failed to load config")?
        }
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let node_id = config.node.node_id();
    let protocol = &config.protocol;
    tracing::info!(
        node = %node_id,
        neighbors = config.neighbors.len(),
        resource_endpoints = config.resources.endpoints.len(),
        initial_ttl = protocol.initial_ttl,
        "finderd starting"
    );

    // ── Core state ───────────────────────────────────────────────────────────
    let transport = HttpTransport::new(config.resources.probe_timeout())
        .context("failed to build neighbor HTTP client")?;
    let neighbors = Arc::new(NeighborhoodManager::new(
        node_id.clone(),
        &config.neighbors,
        protocol.output_queue_capacity,
        Arc::new(transport),
    ));
    let resources = ResourceCache::new();
    let searches = SearchCache::new(protocol.search_expiry());
    let handler = CommunicationHandler::new(protocol, searches.clone(), resources.clone(), neighbors.clone());

    let probe = HttpResourceProbe::new(config.resources.probe_timeout())
        .context("failed to build resource probe HTTP client")?;
    let updater = ResourceCacheUpdater::new(
        resources,
        Arc::new(probe),
        config.resources.endpoints.clone(),
        config.resources.failure_limit,
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────
    neighbors.start();

    let forwarding_sweeper = tokio::spawn(
        handler
            .clone()
            .run_forwarding_sweeper(protocol.forwarding_sweep_period(), shutdown_tx.subscribe()),
    );
    let search_sweeper = tokio::spawn(
        searches.run_sweeper(protocol.search_sweep_period(), shutdown_tx.subscribe()),
    );
    let poller = tokio::spawn(
        updater.run(config.resources.refresh_period(), shutdown_tx.subscribe()),
    );

    let api_task = {
        let state = ApiState::new(node_id.clone(), handler.clone(), shutdown_tx.clone());
        let bind = config.node.api_bind.clone();
        let port = config.node.api_port;
        tokio::spawn(async move {
            if let Err(e) = finder_api::serve(state, &bind, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        biased;
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task           => tracing::error!("API task exited: {:?}", r),
    }
    let _ = shutdown_tx.send(());

    if !neighbors.shutdown(protocol.shutdown_timeout()).await {
        tracing::warn!("some neighbor workers were aborted");
    }
    for (name, task) in [
        ("forwarding sweeper", forwarding_sweeper),
        ("search sweeper", search_sweeper),
        ("resource poller", poller),
    ] {
        if tokio::time::timeout(protocol.shutdown_timeout(), task).await.is_err() {
            tracing::warn!(task = name, "did not stop in time");
        }
    }

    tracing::info!("finderd stopped");
    Ok(())
}
