use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Status of an [`Activity`] (§4.8). Pending → Active → Finished, never
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[repr(i16)]
pub enum ActivityStatus {
    Pending = 0,
    Active = 1,
    Finished = 2,
}

impl ActivityStatus {
    /// Whether `self -> next` is a legal edge in the state graph.
    pub fn can_transition_to(self, next: ActivityStatus) -> bool {
        matches!(
            (self, next),
            (ActivityStatus::Pending, ActivityStatus::Active)
                | (ActivityStatus::Active, ActivityStatus::Finished)
        )
    }
}

/// A time-bounded sale of one product at a discounted price (§3).
///
/// Status is mutated only by the lifecycle scheduler; `available_stock` is
/// mutated only by the order worker (decrement on create) and by the
/// reaper/cancel paths (increment on restore). `total_stock` is immutable
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub product_id: i64,
    pub flash_price: Decimal,
    pub total_stock: i32,
    pub available_stock: i32,
    pub per_user_limit: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ActivityStatus,
}

impl Activity {
    /// Whether `now` falls inside `[start_time, end_time)`.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now < self.end_time
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    pub fn is_active(&self) -> bool {
        self.status == ActivityStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(status: ActivityStatus) -> Activity {
        let now = Utc::now();
        Activity {
            id: 1,
            product_id: 10,
            flash_price: Decimal::new(999, 2),
            total_stock: 100,
            available_stock: 100,
            per_user_limit: 1,
            start_time: now - Duration::seconds(10),
            end_time: now + Duration::seconds(10),
            status,
        }
    }

    #[test]
    fn pending_to_active_is_legal() {
        assert!(ActivityStatus::Pending.can_transition_to(ActivityStatus::Active));
        assert!(ActivityStatus::Active.can_transition_to(ActivityStatus::Finished));
    }

    #[test]
    fn backward_and_skip_transitions_are_illegal() {
        assert!(!ActivityStatus::Active.can_transition_to(ActivityStatus::Pending));
        assert!(!ActivityStatus::Pending.can_transition_to(ActivityStatus::Finished));
        assert!(!ActivityStatus::Finished.can_transition_to(ActivityStatus::Active));
    }

    #[test]
    fn window_checks() {
        let activity = sample(ActivityStatus::Active);
        let now = Utc::now();
        assert!(activity.is_in_window(now));
        assert!(activity.has_started(now));
        assert!(!activity.has_ended(now));
        assert!(activity.is_active());
    }
}
