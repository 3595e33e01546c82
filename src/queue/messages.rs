use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `flash_sale_reservations` message (§3, §4.3): AH → OW.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationMessage {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub activity_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub ticket: String,
}

/// `order_status_events` message (§4.3): OW/LS → NH dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub order_no: String,
    pub old_status: String,
    pub new_status: String,
}
