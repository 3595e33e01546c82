//! Durable Store (DS, §4.9): an abstract row store over `activities` and
//! `orders` (contract only, §6). Every operation takes a caller-supplied
//! deadline and returns a typed error distinguishing "not found" from
//! "transient" from "conflict", so AH/OW/LS can apply §7's taxonomy without
//! string-matching a driver error.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::{Activity, Order, OrderStatus};

pub use postgres::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("conditional update matched zero rows (lost the compare-and-set race)")]
    Conflict,
    #[error("durable store unreachable or timed out: {0}")]
    Transient(String),
}

/// A row update from an existing non-Cancelled status to `Cancelled`,
/// produced by the reaper (§4.6) for publishing an `order_status_events`
/// message per cancellation.
#[derive(Debug, Clone)]
pub struct ReapedOrder {
    pub order: Order,
    pub activity_id: i64,
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get_activity(
        &self,
        activity_id: i64,
        deadline: Duration,
    ) -> Result<Activity, StoreError>;

    /// The one non-Cancelled order for (user, activity), if any (§4.2 step 4,
    /// §4.4 step 2).
    async fn find_live_order(
        &self,
        user_id: i64,
        activity_id: i64,
        deadline: Duration,
    ) -> Result<Option<Order>, StoreError>;

    async fn get_order_by_no(
        &self,
        order_no: &str,
        deadline: Duration,
    ) -> Result<Order, StoreError>;

    /// Insert a new Pending order row (§4.4 step 3).
    #[allow(clippy::too_many_arguments)]
    async fn create_order(
        &self,
        id: i64,
        order_no: &str,
        user_id: i64,
        activity_id: i64,
        quantity: i32,
        amount: rust_decimal::Decimal,
        deadline: Duration,
    ) -> Result<Order, StoreError>;

    /// `UPDATE activities SET available_stock = available_stock - qty WHERE
    /// id = ? AND available_stock >= qty` (§4.4 step 4). `Ok(false)` signals
    /// the zero-rows-affected invariant violation; callers log an alarm and
    /// proceed, since RS is authoritative.
    async fn decrement_available_stock(
        &self,
        activity_id: i64,
        qty: i32,
        deadline: Duration,
    ) -> Result<bool, StoreError>;

    async fn increment_available_stock(
        &self,
        activity_id: i64,
        qty: i32,
        deadline: Duration,
    ) -> Result<(), StoreError>;

    /// Compare-and-set order status. `Ok(false)` means zero rows matched
    /// (contention per §4.8).
    async fn transition_order(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
        deadline: Duration,
    ) -> Result<bool, StoreError>;

    /// §4.6 activity tick: Pending→Active where `start_time <= now`, then
    /// Active→Finished where `end_time <= now`. Returns the number of rows
    /// affected by each half.
    async fn activate_and_finish_activities(
        &self,
        now: DateTime<Utc>,
        deadline: Duration,
    ) -> Result<(u64, u64), StoreError>;

    /// §4.6 order reaper: up to `limit` Pending orders older than `cutoff`,
    /// flipped to Cancelled.
    async fn reap_expired_orders(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        deadline: Duration,
    ) -> Result<Vec<ReapedOrder>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
