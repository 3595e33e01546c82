//! Order Worker (OW, §4.4): consumes `flash_sale_reservations`, creates the
//! durable order, decrements durable stock, and notifies the client via NH.
//!
//! The fetch loop is grounded in the WebSocket push service's polling
//! consumer (`tokio::time::interval` draining a queue); the existing-order
//! check that turns at-least-once delivery into effectively-exactly-once
//! order creation is grounded directly in the source's
//! `FlashSaleService.Rush` step 2 / consumer.go's commit-after-handle loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::notify::{HubHandle, PushEvent};
use crate::queue::{OrderStatusEvent, PartitionedQueue, ReservationMessage};
use crate::reservation::ReservationStore;
use crate::store::{DurableStore, StoreError};

/// How long a shard is polled before the worker checks for no more work
/// (mirrors the source's `MaxWait: 1s` long-poll).
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DS_DEADLINE: Duration = Duration::from_secs(5);

/// A single delivery attempt's outcome, used only by tests to assert on
/// idempotency without threading NH/DS state through assertions.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    AlreadyProcessed,
    PoisonedNoActivity,
}

pub struct OrderWorker {
    store: Arc<dyn DurableStore>,
    rs: Arc<dyn ReservationStore>,
    reservations: Arc<PartitionedQueue<ReservationMessage>>,
    status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
    ids: Arc<crate::ids::SnowflakeGenerator>,
    hub: HubHandle,
}

impl OrderWorker {
    pub fn new(
        store: Arc<dyn DurableStore>,
        rs: Arc<dyn ReservationStore>,
        reservations: Arc<PartitionedQueue<ReservationMessage>>,
        status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
        ids: Arc<crate::ids::SnowflakeGenerator>,
        hub: HubHandle,
    ) -> Self {
        Self {
            store,
            rs,
            reservations,
            status_events,
            ids,
            hub,
        }
    }

    /// Run the consumer loop for one shard until `shutdown` fires. Spawn one
    /// of these per shard for horizontal scale-out (§4.3's consumer group).
    pub async fn run_shard(self: Arc<Self>, shard: usize, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    while let Some(message) = self.reservations.try_pop(shard) {
                        self.handle_with_retry(message).await;
                    }
                }
            }
        }
    }

    /// Process one message, retrying transient failures a bounded number of
    /// times before falling back to the failure path (restore + negative
    /// event), per §4.4's "after exhausting retries" clause.
    async fn handle_with_retry(&self, message: ReservationMessage) {
        const MAX_ATTEMPTS: u32 = 3;
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.handle(&message).await {
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!(
                        target: "ORDER_WORKER",
                        attempt,
                        ticket = %message.ticket,
                        error = %e,
                        "order creation attempt failed"
                    );
                    last_err = Some(e);
                }
            }
        }
        tracing::error!(
            target: "ORDER_WORKER",
            ticket = %message.ticket,
            error = ?last_err,
            "exhausted retries, compensating reservation"
        );
        if let Err(e) = self
            .rs
            .restore(message.activity_id, message.user_id, message.quantity)
            .await
        {
            tracing::error!(target: "ORDER_WORKER", error = %e, "restore after exhausted retries failed");
        }
        self.hub
            .dispatch(
                message.user_id,
                PushEvent::FlashSaleResult {
                    activity_id: message.activity_id,
                    success: false,
                    order_no: None,
                    ticket: message.ticket.clone(),
                    message: "order creation failed, stock restored".to_string(),
                },
            )
            .await;
    }

    async fn handle(&self, message: &ReservationMessage) -> Result<Outcome, StoreError> {
        let activity = match self
            .store
            .get_activity(message.activity_id, DS_DEADLINE)
            .await
        {
            Ok(a) => a,
            Err(StoreError::NotFound) => {
                tracing::error!(
                    target: "ORDER_WORKER",
                    activity_id = message.activity_id,
                    ticket = %message.ticket,
                    "poison message: activity not found, acking without restore"
                );
                return Ok(Outcome::PoisonedNoActivity);
            }
            Err(e) => return Err(e),
        };

        if let Some(existing) = self
            .store
            .find_live_order(message.user_id, message.activity_id, DS_DEADLINE)
            .await?
        {
            self.notify_success(message, &existing.order_no).await;
            return Ok(Outcome::AlreadyProcessed);
        }

        let order_id = self.ids.generate() as i64;
        let order_no = format!("FS{order_id}");
        let amount = activity.flash_price * rust_decimal::Decimal::from(message.quantity);

        let order = self
            .store
            .create_order(
                order_id,
                &order_no,
                message.user_id,
                message.activity_id,
                message.quantity,
                amount,
                DS_DEADLINE,
            )
            .await?;

        let decremented = self
            .store
            .decrement_available_stock(message.activity_id, message.quantity, DS_DEADLINE)
            .await?;
        if !decremented {
            tracing::error!(
                target: "ORDER_WORKER",
                activity_id = message.activity_id,
                order_no = %order.order_no,
                "ALARM: durable stock decrement affected zero rows, RS/DS diverged; RS remains authoritative"
            );
        }

        self.notify_success(message, &order.order_no).await;

        let _ = self
            .status_events
            .publish(
                message.user_id,
                OrderStatusEvent {
                    message_id: order.order_no.clone(),
                    timestamp: Utc::now(),
                    user_id: message.user_id,
                    order_no: order.order_no.clone(),
                    old_status: "None".to_string(),
                    new_status: "Pending".to_string(),
                },
            )
            .await;

        Ok(Outcome::Created)
    }

    async fn notify_success(&self, message: &ReservationMessage, order_no: &str) {
        self.hub
            .dispatch(
                message.user_id,
                PushEvent::FlashSaleResult {
                    activity_id: message.activity_id,
                    success: true,
                    order_no: Some(order_no.to_string()),
                    ticket: message.ticket.clone(),
                    message: "order created".to_string(),
                },
            )
            .await;
    }
}
