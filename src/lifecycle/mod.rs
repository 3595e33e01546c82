//! Lifecycle Scheduler (LS, §4.6): two independent periodic tasks — the
//! activity tick and the order reaper — sharing one shutdown signal.
//!
//! The never-crash, log-and-continue loop shape is grounded in the config
//! watcher's hot-reload loop (`loop { sleep; reload; on error, log and keep
//! the old state }`); the `tokio::select!` against a shutdown channel is new
//! here since that loop never needed to stop early, but §5 (graceful
//! shutdown) requires one for a long-running server process.
//!
//! The reaper publishes the cancellation as an `order_status_events` message
//! rather than dispatching to NH directly; [`crate::notify::StatusDispatcher`]
//! is the only consumer that ever turns that queue into a push to the
//! client, so there is exactly one delivery path to reason about.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::queue::{OrderStatusEvent, PartitionedQueue};
use crate::reservation::ReservationStore;
use crate::store::DurableStore;

const DS_DEADLINE: Duration = Duration::from_secs(5);

pub struct LifecycleScheduler {
    store: Arc<dyn DurableStore>,
    rs: Arc<dyn ReservationStore>,
    status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
    activity_tick_interval: Duration,
    reaper_tick_interval: Duration,
    reaper_batch_limit: i64,
    order_expiry: Duration,
}

impl LifecycleScheduler {
    pub fn new(
        store: Arc<dyn DurableStore>,
        rs: Arc<dyn ReservationStore>,
        status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
        activity_tick_interval: Duration,
        reaper_tick_interval: Duration,
        reaper_batch_limit: i64,
        order_expiry: Duration,
    ) -> Self {
        Self {
            store,
            rs,
            status_events,
            activity_tick_interval,
            reaper_tick_interval,
            reaper_batch_limit,
            order_expiry,
        }
    }

    /// Spawn both background tasks, returning their join handles. Dropping
    /// `shutdown_tx` (or sending `true`) stops both loops after their
    /// current tick finishes.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let activity_shutdown = shutdown.clone();
        let this = self.clone();
        let activity_task = tokio::spawn(async move { this.run_activity_tick(activity_shutdown).await });

        let this = self.clone();
        let reaper_task = tokio::spawn(async move { this.run_order_reaper(shutdown).await });

        (activity_task, reaper_task)
    }

    async fn run_activity_tick(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.activity_tick_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick_activities().await;
                }
            }
        }
    }

    async fn tick_activities(&self) {
        match self
            .store
            .activate_and_finish_activities(Utc::now(), DS_DEADLINE)
            .await
        {
            Ok((activated, finished)) => {
                if activated > 0 || finished > 0 {
                    tracing::info!(
                        target: "LIFECYCLE",
                        activated,
                        finished,
                        "activity tick transitioned rows"
                    );
                }
            }
            Err(e) => {
                tracing::error!(target: "LIFECYCLE", error = %e, "activity tick failed, will retry next interval");
            }
        }
    }

    async fn run_order_reaper(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.reaper_tick_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.reap_expired_orders().await;
                }
            }
        }
    }

    async fn reap_expired_orders(&self) {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.order_expiry).unwrap_or(chrono::Duration::seconds(600));
        let reaped = match self
            .store
            .reap_expired_orders(cutoff, self.reaper_batch_limit, DS_DEADLINE)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(target: "LIFECYCLE", error = %e, "order reaper query failed, will retry next interval");
                return;
            }
        };

        if reaped.is_empty() {
            return;
        }
        tracing::info!(target: "LIFECYCLE", count = reaped.len(), "reaping expired pending orders");

        for reaped_order in reaped {
            let order = reaped_order.order;
            if let Err(e) = self
                .rs
                .restore(reaped_order.activity_id, order.user_id, order.quantity)
                .await
            {
                tracing::error!(
                    target: "LIFECYCLE",
                    order_no = %order.order_no,
                    error = %e,
                    "failed to restore reservation for reaped order"
                );
            }
            if let Err(e) = self
                .store
                .increment_available_stock(reaped_order.activity_id, order.quantity, DS_DEADLINE)
                .await
            {
                tracing::error!(
                    target: "LIFECYCLE",
                    order_no = %order.order_no,
                    error = %e,
                    "failed to restore durable stock for reaped order"
                );
            }

            if let Err(e) = self.status_events.publish(
                order.user_id,
                OrderStatusEvent {
                    message_id: order.order_no.clone(),
                    timestamp: Utc::now(),
                    user_id: order.user_id,
                    order_no: order.order_no.clone(),
                    old_status: "Pending".to_string(),
                    new_status: "Cancelled".to_string(),
                },
            ).await {
                tracing::error!(
                    target: "LIFECYCLE",
                    order_no = %order.order_no,
                    error = %e,
                    "order status event queue full, client will not be notified of cancellation"
                );
            }
        }
    }
}
