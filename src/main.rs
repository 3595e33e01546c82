//! Flash-sale server entry point. Startup order (§5): load config, init
//! logging, connect the durable store, build the in-process collaborators
//! (RS/OQ/NH/id generator), spawn the background workers, then serve HTTP
//! until a shutdown signal arrives.

use std::sync::Arc;

use flash_rush::admission::AdmissionHandler;
use flash_rush::config::AppConfig;
use flash_rush::gateway::state::AppState;
use flash_rush::gateway::run_server;
use flash_rush::ids::SnowflakeGenerator;
use flash_rush::lifecycle::LifecycleScheduler;
use flash_rush::logging;
use flash_rush::notify::{Hub, StatusDispatcher};
use flash_rush::queue::{OrderStatusEvent, PartitionedQueue, ReservationMessage};
use flash_rush::reservation::InMemoryReservationStore;
use flash_rush::store::{DurableStore, PostgresStore};
use flash_rush::worker::OrderWorker;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let _log_guard = logging::init_logging(&config);

    tracing::info!(target: "STARTUP", bind_addr = %config.bind_addr, "starting flash_rush");

    let store: Arc<dyn DurableStore> = Arc::new(
        PostgresStore::connect(&config.database_url, config.database_max_connections)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect durable store: {e}"))?,
    );

    let rs = Arc::new(InMemoryReservationStore::new());
    let ids = Arc::new(SnowflakeGenerator::new(config.node_id).map_err(|e| anyhow::anyhow!(e))?);

    let reservations = Arc::new(PartitionedQueue::<ReservationMessage>::new(
        config.queue_shard_count,
        config.queue_shard_capacity,
    ));
    let status_events = Arc::new(PartitionedQueue::<OrderStatusEvent>::new(
        config.queue_shard_count,
        config.queue_shard_capacity,
    ));

    let hub = Hub::spawn();

    let admission = Arc::new(AdmissionHandler::new(
        store.clone(),
        rs.clone(),
        reservations.clone(),
        ids.clone(),
    ));

    let state = Arc::new(AppState::new(
        admission,
        store.clone(),
        rs.clone(),
        reservations.clone(),
        status_events.clone(),
        hub.clone(),
        ids.clone(),
        config.jwt_secret.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = Arc::new(OrderWorker::new(
        store.clone(),
        rs.clone(),
        reservations.clone(),
        status_events.clone(),
        ids.clone(),
        hub.clone(),
    ));
    let mut worker_handles = Vec::new();
    for shard in 0..reservations.shard_count() {
        let worker = worker.clone();
        let shutdown_rx = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            worker.run_shard(shard, shutdown_rx).await;
        }));
    }

    let scheduler = Arc::new(LifecycleScheduler::new(
        store.clone(),
        rs.clone(),
        status_events.clone(),
        config.activity_tick_interval,
        config.reaper_tick_interval,
        config.reaper_batch_limit,
        config.order_expiry,
    ));
    let (activity_handle, reaper_handle) = scheduler.spawn(shutdown_rx.clone());

    let dispatcher = Arc::new(StatusDispatcher::new(status_events.clone(), hub.clone()));
    let mut dispatcher_handles = Vec::new();
    for shard in 0..status_events.shard_count() {
        let dispatcher = dispatcher.clone();
        let shutdown_rx = shutdown_rx.clone();
        dispatcher_handles.push(tokio::spawn(async move {
            dispatcher.run_shard(shard, shutdown_rx).await;
        }));
    }

    let serve_result = run_server(&config.bind_addr, state).await;

    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }
    for handle in dispatcher_handles {
        let _ = handle.await;
    }
    let _ = activity_handle.await;
    let _ = reaper_handle.await;

    serve_result?;
    tracing::info!(target: "STARTUP", "shutdown complete");
    Ok(())
}
