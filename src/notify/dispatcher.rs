//! Status dispatcher: drains the `order_status_events` topic (§4.3, §4.6)
//! and forwards each entry to NH as a `PushEvent::OrderStatusChange`. This
//! is the sole delivery path for status-change notifications — producers
//! (worker, lifecycle) publish only to the queue and never call
//! `HubHandle::dispatch` directly for a status change, so there is exactly
//! one place a backlog can be observed instead of two divergent paths.
//!
//! Polling shape grounded in [`crate::worker::OrderWorker::run_shard`]: one
//! task per shard, draining with `tokio::time::interval` until `shutdown`
//! fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::queue::{OrderStatusEvent, PartitionedQueue};

use super::{HubHandle, PushEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct StatusDispatcher {
    status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
    hub: HubHandle,
}

impl StatusDispatcher {
    pub fn new(status_events: Arc<PartitionedQueue<OrderStatusEvent>>, hub: HubHandle) -> Self {
        Self { status_events, hub }
    }

    /// Run the consumer loop for one shard until `shutdown` fires. Spawn one
    /// of these per shard, matching the queue's shard count.
    pub async fn run_shard(self: Arc<Self>, shard: usize, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    while let Some(event) = self.status_events.try_pop(shard) {
                        self.hub
                            .dispatch(
                                event.user_id,
                                PushEvent::OrderStatusChange {
                                    order_no: event.order_no,
                                    old_status: event.old_status,
                                    new_status: event.new_status,
                                },
                            )
                            .await;
                    }
                }
            }
        }
    }
}
