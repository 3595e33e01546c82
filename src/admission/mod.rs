//! Admission Handler (AH, §4.2): the synchronous HTTP entry point — validate,
//! lock, reserve, enqueue, return a ticket. Grounded in the source's
//! `FlashSaleService.Rush` (temporal-window check, existing-order check,
//! lock-then-deduct-then-unlock via a deferred release) combined with the
//! gateway's validate-then-enqueue-then-202 shape used elsewhere in this
//! crate for the synchronous order path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::RushError;
use crate::ids::SnowflakeGenerator;
use crate::queue::{PartitionedQueue, QueueError, ReservationMessage};
use crate::reservation::{ReservationError, ReservationStore};
use crate::store::{DurableStore, StoreError};

/// Deadlines named in §5: 5 s for RS and DS, 10 s for OQ publish. The per-user
/// lock TTL is fixed at 10 s per §3 — the source holds it across the OQ
/// publish rather than releasing early (§9's resolved open question).
pub const RS_DEADLINE: Duration = Duration::from_secs(5);
pub const DS_DEADLINE: Duration = Duration::from_secs(5);
pub const OQ_PUBLISH_DEADLINE: Duration = Duration::from_secs(10);
pub const LOCK_TTL: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Admitted {
    pub ticket: String,
}

pub struct AdmissionHandler {
    store: Arc<dyn DurableStore>,
    rs: Arc<dyn ReservationStore>,
    queue: Arc<PartitionedQueue<ReservationMessage>>,
    ids: Arc<SnowflakeGenerator>,
}

impl AdmissionHandler {
    pub fn new(
        store: Arc<dyn DurableStore>,
        rs: Arc<dyn ReservationStore>,
        queue: Arc<PartitionedQueue<ReservationMessage>>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            store,
            rs,
            queue,
            ids,
        }
    }

    /// Run the admission algorithm for an already-authenticated `user_id`
    /// rushing `quantity` units of `activity_id`. `quantity` is assumed
    /// already validated (`>= 1`) by the HTTP layer (§4.2 step 1).
    pub async fn rush(
        &self,
        activity_id: i64,
        user_id: i64,
        quantity: i32,
    ) -> Result<Admitted, RushError> {
        let activity = self
            .store
            .get_activity(activity_id, DS_DEADLINE)
            .await
            .map_err(Self::store_err_to_rush)?;

        let now = Utc::now();
        if !activity.has_started(now) {
            return Err(RushError::NotStarted);
        }
        if activity.has_ended(now) {
            return Err(RushError::Ended);
        }
        if !activity.is_active() {
            return Err(RushError::NotActive);
        }

        if let Some(existing) = self
            .store
            .find_live_order(user_id, activity_id, DS_DEADLINE)
            .await
            .map_err(Self::store_err_to_rush)?
        {
            return Err(RushError::AlreadyPurchased {
                order_no: existing.order_no,
            });
        }

        self.rs.ensure_seeded(activity_id, activity.total_stock).await;

        let token = self
            .rs
            .try_lock(activity_id, user_id, LOCK_TTL)
            .await
            .map_err(Self::rs_err_to_rush)?;

        // Mirrors the source's `defer lock.Unlock()`: every exit path below
        // releases the lock exactly once, regardless of outcome.
        let result = self
            .reserve_and_enqueue(&activity, activity_id, user_id, quantity)
            .await;
        let _ = self.rs.unlock(activity_id, user_id, token).await;
        result
    }

    async fn reserve_and_enqueue(
        &self,
        activity: &crate::domain::Activity,
        activity_id: i64,
        user_id: i64,
        quantity: i32,
    ) -> Result<Admitted, RushError> {
        self.rs
            .reserve(activity_id, user_id, quantity, activity.per_user_limit)
            .await
            .map_err(Self::rs_err_to_rush)?;

        let ticket = self.ids.generate_ticket();
        let message = ReservationMessage {
            message_id: ticket.clone(),
            timestamp: Utc::now(),
            activity_id,
            user_id,
            quantity,
            ticket: ticket.clone(),
        };

        let publish = tokio::time::timeout(
            OQ_PUBLISH_DEADLINE,
            self.queue.publish(user_id, message),
        )
        .await;

        match publish {
            Ok(Ok(())) => Ok(Admitted { ticket }),
            Ok(Err(QueueError::Full)) | Err(_) => {
                // Publish failed: compensate immediately (§4.2 step 7).
                if let Err(e) = self.rs.restore(activity_id, user_id, quantity).await {
                    tracing::error!(
                        target: "ADMISSION",
                        activity_id,
                        user_id,
                        error = %e,
                        "failed to restore reservation after enqueue failure"
                    );
                }
                Err(RushError::SystemBusy)
            }
        }
    }

    fn rs_err_to_rush(err: ReservationError) -> RushError {
        match err {
            ReservationError::InsufficientStock => RushError::StockInsufficient,
            ReservationError::LimitExceeded => RushError::LimitExceeded,
            ReservationError::LockHeld => RushError::DuplicateSubmit,
            ReservationError::UnknownActivity(_)
            | ReservationError::TokenMismatch
            | ReservationError::StoreUnavailable => RushError::SystemBusy,
        }
    }

    fn store_err_to_rush(err: StoreError) -> RushError {
        match err {
            StoreError::NotFound => RushError::NotActive,
            StoreError::Conflict | StoreError::Transient(_) => RushError::SystemBusy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, ActivityStatus, Order, OrderStatus};
    use crate::reservation::InMemoryReservationStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    struct FakeStore {
        activity: Mutex<Activity>,
        live_order: Mutex<Option<Order>>,
    }

    fn sample_activity(status: ActivityStatus, total_stock: i32, per_user_limit: i32) -> Activity {
        let now = Utc::now();
        Activity {
            id: 1,
            product_id: 1,
            flash_price: Decimal::new(999, 2),
            total_stock,
            available_stock: total_stock,
            per_user_limit,
            start_time: now - ChronoDuration::seconds(10),
            end_time: now + ChronoDuration::seconds(60),
            status,
        }
    }

    #[async_trait]
    impl DurableStore for FakeStore {
        async fn get_activity(&self, _id: i64, _d: Duration) -> Result<Activity, StoreError> {
            Ok(self.activity.lock().unwrap().clone())
        }
        async fn find_live_order(
            &self,
            _u: i64,
            _a: i64,
            _d: Duration,
        ) -> Result<Option<Order>, StoreError> {
            Ok(self.live_order.lock().unwrap().clone())
        }
        async fn get_order_by_no(&self, _o: &str, _d: Duration) -> Result<Order, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn create_order(
            &self,
            _id: i64,
            _no: &str,
            _u: i64,
            _a: i64,
            _q: i32,
            _amt: Decimal,
            _d: Duration,
        ) -> Result<Order, StoreError> {
            unimplemented!("not exercised by admission tests")
        }
        async fn decrement_available_stock(
            &self,
            _a: i64,
            _q: i32,
            _d: Duration,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn increment_available_stock(
            &self,
            _a: i64,
            _q: i32,
            _d: Duration,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn transition_order(
            &self,
            _id: i64,
            _from: OrderStatus,
            _to: OrderStatus,
            _d: Duration,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn activate_and_finish_activities(
            &self,
            _now: chrono::DateTime<Utc>,
            _d: Duration,
        ) -> Result<(u64, u64), StoreError> {
            Ok((0, 0))
        }
        async fn reap_expired_orders(
            &self,
            _cutoff: chrono::DateTime<Utc>,
            _limit: i64,
            _d: Duration,
        ) -> Result<Vec<crate::store::ReapedOrder>, StoreError> {
            Ok(Vec::new())
        }
        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn handler(activity: Activity) -> AdmissionHandler {
        let store = Arc::new(FakeStore {
            activity: Mutex::new(activity),
            live_order: Mutex::new(None),
        });
        let rs = Arc::new(InMemoryReservationStore::new());
        let queue = Arc::new(PartitionedQueue::new(4, 1024));
        let ids = Arc::new(SnowflakeGenerator::new(1).unwrap());
        AdmissionHandler::new(store, rs, queue, ids)
    }

    #[tokio::test]
    async fn successful_rush_returns_a_ticket_and_decrements_rs() {
        let ah = handler(sample_activity(ActivityStatus::Active, 10, 5));
        let admitted = ah.rush(1, 100, 2).await.unwrap();
        assert!(admitted.ticket.starts_with("TK"));
        assert_eq!(ah.rs.live_stock(1).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn not_started_activity_is_rejected() {
        let mut activity = sample_activity(ActivityStatus::Pending, 10, 5);
        activity.start_time = Utc::now() + ChronoDuration::seconds(60);
        let ah = handler(activity);
        assert!(matches!(ah.rush(1, 1, 1).await, Err(RushError::NotStarted)));
    }

    #[tokio::test]
    async fn ended_activity_is_rejected() {
        let mut activity = sample_activity(ActivityStatus::Active, 10, 5);
        activity.end_time = Utc::now() - ChronoDuration::seconds(1);
        let ah = handler(activity);
        assert!(matches!(ah.rush(1, 1, 1).await, Err(RushError::Ended)));
    }

    #[tokio::test]
    async fn single_winner_across_concurrent_users() {
        let ah = Arc::new(handler(sample_activity(ActivityStatus::Active, 1, 1)));
        let mut handles = Vec::new();
        for user in 0..100i64 {
            let ah = ah.clone();
            handles.push(tokio::spawn(async move { ah.rush(1, user, 1).await.is_ok() }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn lock_is_released_after_a_terminal_failure_so_retry_can_succeed() {
        let ah = handler(sample_activity(ActivityStatus::Active, 1, 1));
        // Exhaust stock with a different user first.
        ah.rush(1, 1, 1).await.unwrap();
        let err = ah.rush(1, 2, 1).await.unwrap_err();
        assert!(matches!(err, RushError::StockInsufficient));
        // A second attempt by the same user must not be blocked by a
        // leftover lock from the failed attempt.
        let err2 = ah.rush(1, 2, 1).await.unwrap_err();
        assert!(matches!(err2, RushError::StockInsufficient));
    }
}
