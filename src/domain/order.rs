use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Status of an [`Order`] (§4.8). Pending is the only creation status;
/// Cancelled and Refunded are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[repr(i16)]
pub enum OrderStatus {
    Pending = 0,
    Paid = 1,
    Cancelled = 2,
    Refunded = 3,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("illegal order transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Whether `self -> next` is a legal edge: Pending→Paid, Pending→Cancelled,
    /// Paid→Refunded. All other transitions (including any self-loop) are
    /// forbidden.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Refunded)
        )
    }

    pub fn checked_transition(self, next: OrderStatus) -> Result<OrderStatus, IllegalTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

/// A durable record of a user's successful reservation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub activity_id: i64,
    pub quantity: i32,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_live(&self) -> bool {
        self.status != OrderStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_may_move_to_paid_or_cancelled() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Paid,
                OrderStatus::Cancelled,
                OrderStatus::Refunded,
            ] {
                assert!(terminal.checked_transition(next).is_err());
            }
        }
    }

    #[test]
    fn self_loop_and_skip_are_illegal() {
        assert!(OrderStatus::Pending.checked_transition(OrderStatus::Pending).is_err());
        assert!(OrderStatus::Pending.checked_transition(OrderStatus::Refunded).is_err());
    }

    #[test]
    fn is_terminal_classification() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }
}
