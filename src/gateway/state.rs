//! Shared application state (§9: no global singletons — everything lives
//! here and is threaded through handlers and background tasks at startup).
//! Field shape mirrors the source gateway's `AppState`, replacing the
//! matching-engine collaborators with this crate's RS/OQ/NH/DS/id-generator.

use std::sync::Arc;
use std::time::Instant;

use crate::admission::AdmissionHandler;
use crate::ids::SnowflakeGenerator;
use crate::notify::HubHandle;
use crate::queue::{OrderStatusEvent, PartitionedQueue, ReservationMessage};
use crate::reservation::ReservationStore;
use crate::store::DurableStore;

#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionHandler>,
    pub store: Arc<dyn DurableStore>,
    pub rs: Arc<dyn ReservationStore>,
    pub reservations: Arc<PartitionedQueue<ReservationMessage>>,
    pub status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
    pub hub: HubHandle,
    pub ids: Arc<SnowflakeGenerator>,
    pub jwt_secret: String,
    pub started_at: Instant,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admission: Arc<AdmissionHandler>,
        store: Arc<dyn DurableStore>,
        rs: Arc<dyn ReservationStore>,
        reservations: Arc<PartitionedQueue<ReservationMessage>>,
        status_events: Arc<PartitionedQueue<OrderStatusEvent>>,
        hub: HubHandle,
        ids: Arc<SnowflakeGenerator>,
        jwt_secret: String,
    ) -> Self {
        Self {
            admission,
            store,
            rs,
            reservations,
            status_events,
            hub,
            ids,
            jwt_secret,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
