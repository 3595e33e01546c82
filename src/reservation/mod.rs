//! Reservation Store (RS, §4.1): atomic stock/per-user-tally/mutex keyed by
//! activity and user.
//!
//! The specification requires "an external key-value store that supports
//! server-side script execution against multiple keys in one atomic step" —
//! the requirement is atomicity of the five sub-operations in `reserve`, not
//! any particular product. This crate satisfies it with an in-process
//! concurrent map (single primary, matching §1's non-goal of excluding
//! geo-distribution) behind the [`ReservationStore`] trait, so a networked
//! backend can be substituted without touching callers.

pub mod memory;

use async_trait::async_trait;

pub use memory::InMemoryReservationStore;

/// Opaque fencing token returned by [`ReservationStore::try_lock`]. Only the
/// holder of the matching token may release the lock (§4.1), which prevents
/// releasing a lock that has since expired and been reacquired by someone
/// else.
pub type FencingToken = uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("live stock insufficient")]
    InsufficientStock,
    #[error("per-user purchase limit exceeded")]
    LimitExceeded,
    #[error("activity {0} has no reservation state")]
    UnknownActivity(i64),
    #[error("lock is held by another submission")]
    LockHeld,
    #[error("fencing token mismatch, lock already released or reacquired")]
    TokenMismatch,
    #[error("reservation store unavailable")]
    StoreUnavailable,
}

/// The three atomic operations §4.1 demands: Reserve, Restore, TryLock/Unlock.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Seed `live_stock` for an activity at creation time. Idempotent: a
    /// second call for the same activity resets the count (used by tests and
    /// by re-running a seed job safely).
    async fn init_stock(&self, activity_id: i64, total_stock: i32);

    /// Atomically: check `live_stock >= qty` and `bought[user] + qty <=
    /// per_user_limit`, then apply both, or apply neither.
    async fn reserve(
        &self,
        activity_id: i64,
        user_id: i64,
        qty: i32,
        per_user_limit: i32,
    ) -> Result<(), ReservationError>;

    /// Increment `live_stock` by `qty`; decrement `bought[user]` by
    /// `min(qty, bought[user])`, never below zero.
    async fn restore(
        &self,
        activity_id: i64,
        user_id: i64,
        qty: i32,
    ) -> Result<(), ReservationError>;

    /// Acquire the per-(activity,user) mutex for `ttl`. Returns the fencing
    /// token on success, `LockHeld` if already locked by a live holder.
    async fn try_lock(
        &self,
        activity_id: i64,
        user_id: i64,
        ttl: std::time::Duration,
    ) -> Result<FencingToken, ReservationError>;

    /// Release the lock iff `token` matches the current holder.
    async fn unlock(
        &self,
        activity_id: i64,
        user_id: i64,
        token: FencingToken,
    ) -> Result<(), ReservationError>;

    /// Current `live_stock` for an activity, for the `GET .../stock` endpoint.
    async fn live_stock(&self, activity_id: i64) -> Result<i32, ReservationError>;

    /// Current `bought[user]` tally, exposed for tests of invariant 4.
    async fn bought(&self, activity_id: i64, user_id: i64) -> i32;

    /// Seed stock for `activity_id` iff it has no reservation state yet.
    /// RS is volatile in-process state; this lets callers (AH, OW) recover
    /// from a process restart by re-deriving the seed from the durable
    /// `total_stock` without clobbering live counters if the state already
    /// exists.
    async fn ensure_seeded(&self, activity_id: i64, total_stock: i32);
}
