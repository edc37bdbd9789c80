//! Service wiring and the API server loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use fleetplace_core::SchedulerConfig;
use fleetplace_hostclient::HttpHostScorer;
use fleetplace_placement::StaticFleetSampler;
use fleetplace_scheduler::{PlacementPorts, PlacementService};
use fleetplace_state::TaskStore;

/// Open the task store the config asks for.
fn open_store(config: &SchedulerConfig) -> anyhow::Result<TaskStore> {
    match &config.store.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data dir {}", dir.display()))?;
            let path = dir.join("fleetplace.redb");
            let store = TaskStore::open(&path)?;
            info!(path = ?path, "task store opened");
            Ok(store)
        }
        None => {
            let store = TaskStore::open_in_memory()?;
            info!("task store opened in memory");
            Ok(store)
        }
    }
}

/// Build the placement service from config.
fn build_service(config: &SchedulerConfig, store: TaskStore) -> anyhow::Result<PlacementService> {
    for image in &config.images {
        store.put_image_datastores(&image.id, image.datastores.iter().cloned())?;
    }
    info!(images = config.images.len(), "image locality seeded");

    let sampler = StaticFleetSampler::from_entries(&config.hosts)?;
    info!(hosts = sampler.len(), "static fleet loaded");

    let scorer = HttpHostScorer::new(Duration::from_millis(
        config.host_client.request_timeout_ms,
    ));

    let ports = PlacementPorts {
        sampler: Arc::new(sampler),
        locality: Arc::new(store.clone()),
        scorer: Arc::new(scorer),
    };
    Ok(PlacementService::new(store, ports, config.placement.clone()))
}

pub async fn run(config: SchedulerConfig) -> anyhow::Result<()> {
    config.validate()?;
    info!(
        max_fanout_count = config.placement.max_fanout_count,
        timeout_ms = config.placement.timeout_ms,
        "Fleetplace daemon starting"
    );

    let store = open_store(&config)?;
    let service = build_service(&config, store)?;
    service.fail_orphaned()?;

    let router = fleetplace_api::build_router(service.clone());
    let addr: SocketAddr = config
        .api
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.api.listen))?;

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => {
                    warn!(error = %e, "failed to install Ctrl-C handler");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    service.stop_all().await;
    info!("Fleetplace daemon stopped");
    Ok(())
}
