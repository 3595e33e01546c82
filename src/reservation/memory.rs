//! In-process implementation of [`ReservationStore`].
//!
//! Grounded in the same two patterns used elsewhere in this crate: a
//! concurrent map keyed by id (as the notification hub's connection map
//! uses `DashMap`), and private-field, checked-arithmetic state mutated only
//! through methods that return `Result` (as the settlement balance type
//! does). Per-activity state is further guarded by its own mutex so the
//! five sub-steps of `reserve` apply as one atomic unit, mirroring the
//! source's Lua script.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use super::{FencingToken, ReservationError, ReservationStore};

const BOUGHT_LEASE: Duration = Duration::from_secs(24 * 3600);

struct BoughtEntry {
    qty: i32,
    expires_at: Instant,
}

/// Reservation state for a single activity. `live_stock` is read outside the
/// critical section for the cheap `GET .../stock` path; all mutations go
/// through `critical`, which serializes `reserve`/`restore` against each
/// other so the five sub-operations of `reserve` are indivisible.
struct ActivityState {
    live_stock: AtomicI32,
    bought: DashMap<i64, BoughtEntry>,
    critical: AsyncMutex<()>,
}

impl ActivityState {
    fn new(total_stock: i32) -> Self {
        Self {
            live_stock: AtomicI32::new(total_stock),
            bought: DashMap::new(),
            critical: AsyncMutex::new(()),
        }
    }

    fn bought_qty(&self, user_id: i64) -> i32 {
        self.bought
            .get(&user_id)
            .map(|e| e.qty)
            .unwrap_or(0)
    }
}

struct LockEntry {
    token: FencingToken,
    expires_at: Instant,
}

pub struct InMemoryReservationStore {
    activities: DashMap<i64, ActivityState>,
    locks: DashMap<(i64, i64), LockEntry>,
}

impl Default for InMemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self {
            activities: DashMap::new(),
            locks: DashMap::new(),
        }
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn init_stock(&self, activity_id: i64, total_stock: i32) {
        self.activities
            .insert(activity_id, ActivityState::new(total_stock));
    }

    async fn ensure_seeded(&self, activity_id: i64, total_stock: i32) {
        self.activities
            .entry(activity_id)
            .or_insert_with(|| ActivityState::new(total_stock));
    }

    async fn reserve(
        &self,
        activity_id: i64,
        user_id: i64,
        qty: i32,
        per_user_limit: i32,
    ) -> Result<(), ReservationError> {
        let state = self
            .activities
            .get(&activity_id)
            .ok_or(ReservationError::UnknownActivity(activity_id))?;

        let _guard = state.critical.lock().await;

        let live = state.live_stock.load(Ordering::SeqCst);
        if live < qty {
            return Err(ReservationError::InsufficientStock);
        }
        let already_bought = state.bought_qty(user_id);
        if already_bought + qty > per_user_limit {
            return Err(ReservationError::LimitExceeded);
        }

        state.live_stock.fetch_sub(qty, Ordering::SeqCst);
        state.bought.insert(
            user_id,
            BoughtEntry {
                qty: already_bought + qty,
                expires_at: Instant::now() + BOUGHT_LEASE,
            },
        );
        Ok(())
    }

    async fn restore(
        &self,
        activity_id: i64,
        user_id: i64,
        qty: i32,
    ) -> Result<(), ReservationError> {
        let state = self
            .activities
            .get(&activity_id)
            .ok_or(ReservationError::UnknownActivity(activity_id))?;

        let _guard = state.critical.lock().await;

        state.live_stock.fetch_add(qty, Ordering::SeqCst);
        let current = state.bought_qty(user_id);
        let restored = current.saturating_sub(qty).max(0);
        if restored == 0 {
            state.bought.remove(&user_id);
        } else {
            state.bought.insert(
                user_id,
                BoughtEntry {
                    qty: restored,
                    expires_at: Instant::now() + BOUGHT_LEASE,
                },
            );
        }
        Ok(())
    }

    async fn try_lock(
        &self,
        activity_id: i64,
        user_id: i64,
        ttl: Duration,
    ) -> Result<FencingToken, ReservationError> {
        let key = (activity_id, user_id);
        let now = Instant::now();

        if let Some(existing) = self.locks.get(&key)
            && existing.expires_at > now
        {
            return Err(ReservationError::LockHeld);
        }

        let token = uuid::Uuid::new_v4();
        self.locks.insert(
            key,
            LockEntry {
                token,
                expires_at: now + ttl,
            },
        );
        Ok(token)
    }

    async fn unlock(
        &self,
        activity_id: i64,
        user_id: i64,
        token: FencingToken,
    ) -> Result<(), ReservationError> {
        let key = (activity_id, user_id);
        match self.locks.get(&key) {
            Some(entry) if entry.token == token => {
                drop(entry);
                self.locks.remove(&key);
                Ok(())
            }
            Some(_) => Err(ReservationError::TokenMismatch),
            None => Err(ReservationError::TokenMismatch),
        }
    }

    async fn live_stock(&self, activity_id: i64) -> Result<i32, ReservationError> {
        self.activities
            .get(&activity_id)
            .map(|s| s.live_stock.load(Ordering::SeqCst))
            .ok_or(ReservationError::UnknownActivity(activity_id))
    }

    async fn bought(&self, activity_id: i64, user_id: i64) -> i32 {
        self.activities
            .get(&activity_id)
            .map(|s| s.bought_qty(user_id))
            .unwrap_or(0)
    }
}

/// Snapshot used by invariant tests: `live_stock + Σ bought == total_stock`.
pub async fn conservation_snapshot(
    store: &InMemoryReservationStore,
    activity_id: i64,
) -> Option<(i32, HashMap<i64, i32>)> {
    let state = store.activities.get(&activity_id)?;
    let live = state.live_stock.load(Ordering::SeqCst);
    let bought: HashMap<i64, i32> = state
        .bought
        .iter()
        .map(|e| (*e.key(), e.value().qty))
        .collect();
    Some((live, bought))
}
