//! End-to-end exercise of the synchronous rush path handing off to the
//! asynchronous order worker, against an in-memory durable store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;

use flash_rush::admission::AdmissionHandler;
use flash_rush::domain::{Activity, ActivityStatus, Order, OrderStatus};
use flash_rush::ids::SnowflakeGenerator;
use flash_rush::notify::{Hub, PushEvent};
use flash_rush::queue::{OrderStatusEvent, PartitionedQueue, ReservationMessage};
use flash_rush::reservation::{InMemoryReservationStore, ReservationStore};
use flash_rush::store::{DurableStore, ReapedOrder, StoreError};
use flash_rush::worker::OrderWorker;

struct FakeStore {
    activity: Activity,
    orders: Mutex<Vec<Order>>,
}

#[async_trait]
impl DurableStore for FakeStore {
    async fn get_activity(&self, _id: i64, _d: Duration) -> Result<Activity, StoreError> {
        Ok(self.activity.clone())
    }

    async fn find_live_order(
        &self,
        user_id: i64,
        activity_id: i64,
        _d: Duration,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.user_id == user_id && o.activity_id == activity_id && o.is_live())
            .cloned())
    }

    async fn get_order_by_no(&self, order_no: &str, _d: Duration) -> Result<Order, StoreError> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.order_no == order_no)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_order(
        &self,
        id: i64,
        order_no: &str,
        user_id: i64,
        activity_id: i64,
        quantity: i32,
        amount: Decimal,
        _d: Duration,
    ) -> Result<Order, StoreError> {
        let now = Utc::now();
        let order = Order {
            id,
            order_no: order_no.to_string(),
            user_id,
            activity_id,
            quantity,
            amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }

    async fn decrement_available_stock(&self, _a: i64, _q: i32, _d: Duration) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn increment_available_stock(&self, _a: i64, _q: i32, _d: Duration) -> Result<(), StoreError> {
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
        _now: DateTime<Utc>,
        _d: Duration,
    ) -> Result<(u64, u64), StoreError> {
        Ok((0, 0))
    }

    async fn reap_expired_orders(
        &self,
        _cutoff: DateTime<Utc>,
        _limit: i64,
        _d: Duration,
    ) -> Result<Vec<ReapedOrder>, StoreError> {
        Ok(Vec::new())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn sample_activity() -> Activity {
    let now = Utc::now();
    Activity {
        id: 1,
        product_id: 10,
        flash_price: Decimal::new(999, 2),
        total_stock: 5,
        available_stock: 5,
        per_user_limit: 1,
        start_time: now - ChronoDuration::seconds(10),
        end_time: now + ChronoDuration::seconds(3600),
        status: ActivityStatus::Active,
    }
}

#[tokio::test]
async fn a_successful_rush_is_handed_off_and_settled_into_an_order() {
    let store: Arc<dyn DurableStore> = Arc::new(FakeStore {
        activity: sample_activity(),
        orders: Mutex::new(Vec::new()),
    });
    let rs = Arc::new(InMemoryReservationStore::new());
    let ids = Arc::new(SnowflakeGenerator::new(1).unwrap());
    let reservations = Arc::new(PartitionedQueue::<ReservationMessage>::new(1, 16));
    let status_events = Arc::new(PartitionedQueue::<OrderStatusEvent>::new(1, 16));
    let hub = Hub::spawn();

    let admission = AdmissionHandler::new(store.clone(), rs.clone(), reservations.clone(), ids.clone());
    let mut events = hub.register(7, hub.next_connection_id()).await;

    let admitted = admission.rush(1, 7, 1).await.expect("rush succeeds");
    assert!(admitted.ticket.starts_with("TK"));
    assert_eq!(rs.live_stock(1).await.unwrap(), 4);

    let worker = Arc::new(OrderWorker::new(
        store.clone(),
        rs.clone(),
        reservations.clone(),
        status_events.clone(),
        ids.clone(),
        hub.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_task = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run_shard(0, shutdown_rx).await }
    });

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("event arrives")
        .expect("channel open");
    match event {
        PushEvent::FlashSaleResult { success, order_no, .. } => {
            assert!(success);
            assert!(order_no.is_some());
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let _ = shutdown_tx.send(true);
    worker_task.await.unwrap();

    let second = admission.rush(1, 7, 1).await;
    assert!(matches!(
        second,
        Err(flash_rush::error::RushError::AlreadyPurchased { .. })
    ));
}

#[tokio::test]
async fn rush_is_rejected_once_stock_is_exhausted() {
    let mut activity = sample_activity();
    activity.total_stock = 1;
    activity.available_stock = 1;
    activity.per_user_limit = 1;
    let store: Arc<dyn DurableStore> = Arc::new(FakeStore {
        activity,
        orders: Mutex::new(Vec::new()),
    });
    let rs = Arc::new(InMemoryReservationStore::new());
    let ids = Arc::new(SnowflakeGenerator::new(2).unwrap());
    let reservations = Arc::new(PartitionedQueue::<ReservationMessage>::new(1, 16));
    let admission = AdmissionHandler::new(store, rs, reservations, ids);

    admission.rush(1, 1, 1).await.expect("first buyer succeeds");
    let rejected = admission.rush(1, 2, 1).await;
    assert!(matches!(
        rejected,
        Err(flash_rush::error::RushError::StockInsufficient)
    ));
}
