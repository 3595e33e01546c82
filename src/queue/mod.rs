//! Order Queue (OQ, §4.3): a durable, at-least-once FIFO with per-key
//! (user-id) ordering and consumer-group-style scale-out for OW.
//!
//! Grounded in two source shapes: the gateway's synchronous order path
//! (`crossbeam_queue::ArrayQueue`, push-or-503-on-full) for the producer
//! side, and the original service's Kafka consumer (fetch → handle → ack,
//! redeliver on handler failure) for the consumer side. Both topics named in
//! §4.3 — `flash_sale_reservations` and `order_status_events` — are modeled
//! as instances of the same generic [`PartitionedQueue`], partitioned by
//! user id so a user's reservation and its status events always land on the
//! same shard and are observed in issue order by a single consumer.

pub mod messages;

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

pub use messages::{OrderStatusEvent, ReservationMessage};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue shard is full")]
    Full,
}

/// A FIFO partitioned into a fixed number of shards, each bounded. Publishing
/// is keyed by `user_id % shard_count`; a single shard is consumed
/// single-threaded by whichever [`crate::worker`]/NH-dispatcher task owns it,
/// which is what gives per-user ordering.
pub struct PartitionedQueue<T> {
    shards: Vec<Arc<ArrayQueue<T>>>,
}

impl<T> PartitionedQueue<T> {
    pub fn new(shard_count: usize, shard_capacity: usize) -> Self {
        assert!(shard_count > 0, "a partitioned queue needs at least one shard");
        let shards = (0..shard_count)
            .map(|_| Arc::new(ArrayQueue::new(shard_capacity)))
            .collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, partition_key: i64) -> usize {
        (partition_key.unsigned_abs() as usize) % self.shards.len()
    }

    /// Publish `item`, partitioned by `partition_key` (user id). Producers
    /// block until the broker acknowledges per §4.3; acknowledgement here is
    /// synchronous with the in-process push, so this never actually awaits —
    /// the method is still `async` so a networked implementation of the same
    /// contract can await a real broker ack without changing callers.
    pub async fn publish(&self, partition_key: i64, item: T) -> Result<(), QueueError> {
        let shard = self.shard_for(partition_key);
        self.shards[shard]
            .push(item)
            .map_err(|_| QueueError::Full)
    }

    /// Re-publish `item` onto its original shard for at-least-once redelivery
    /// after a handler failure. Used by consumers, never by producers.
    pub fn requeue(&self, partition_key: i64, item: T) -> Result<(), QueueError> {
        let shard = self.shard_for(partition_key);
        self.shards[shard]
            .push(item)
            .map_err(|_| QueueError::Full)
    }

    /// Non-blocking fetch from a specific shard. Workers poll their assigned
    /// shards; see [`crate::worker`] for the fetch-handle-ack loop.
    pub fn try_pop(&self, shard: usize) -> Option<T> {
        self.shards[shard].pop()
    }
}
