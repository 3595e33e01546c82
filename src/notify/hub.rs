//! The NH coordinator task and its handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::events::PushEvent;

pub type ConnectionId = u64;

/// Per-connection outgoing buffer capacity (§3): 256 slots. When full, the
/// connection is evicted rather than coalescing or dropping events silently.
pub const SEND_BUFFER_CAPACITY: usize = 256;

/// `user_id` reserved to mean "broadcast to every connection" (§4.5).
pub const BROADCAST_USER_ID: i64 = 0;

enum Command {
    Register {
        user_id: i64,
        conn_id: ConnectionId,
        sender: mpsc::Sender<PushEvent>,
    },
    Unregister {
        user_id: i64,
        conn_id: ConnectionId,
    },
    Dispatch {
        user_id: i64,
        event: PushEvent,
    },
}

/// Namespace for spawning the coordinator; holds no state itself.
pub struct Hub;

impl Hub {
    /// Spawn the coordinator task and return a cheaply cloneable handle.
    /// Nothing outside this module ever sees the connection map.
    pub fn spawn() -> HubHandle {
        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(Self::run(rx));
        HubHandle {
            commands: tx,
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn run(mut commands: mpsc::Receiver<Command>) {
        let mut connections: HashMap<i64, (ConnectionId, mpsc::Sender<PushEvent>)> =
            HashMap::new();

        while let Some(cmd) = commands.recv().await {
            match cmd {
                Command::Register {
                    user_id,
                    conn_id,
                    sender,
                } => {
                    // Most-recent wins; replacing the map entry drops the
                    // prior sender, which evicts the old connection.
                    connections.insert(user_id, (conn_id, sender));
                }
                Command::Unregister { user_id, conn_id } => {
                    if let Some((current, _)) = connections.get(&user_id) {
                        if *current == conn_id {
                            connections.remove(&user_id);
                        }
                    }
                }
                Command::Dispatch { user_id, event } => {
                    if user_id == BROADCAST_USER_ID {
                        let mut dead = Vec::new();
                        for (uid, (conn_id, sender)) in connections.iter() {
                            if sender.try_send(event.clone()).is_err() {
                                dead.push((*uid, *conn_id));
                            }
                        }
                        for (uid, conn_id) in dead {
                            if let Some((current, _)) = connections.get(&uid)
                                && *current == conn_id
                            {
                                connections.remove(&uid);
                            }
                        }
                    } else if let Some((_, sender)) = connections.get(&user_id)
                        && sender.try_send(event).is_err()
                    {
                        connections.remove(&user_id);
                    }
                }
            }
        }
    }
}

/// Cheaply cloneable handle callers use to talk to the coordinator. Holds no
/// connection state itself — every operation is a channel send.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
    next_conn_id: Arc<AtomicU64>,
}

impl HubHandle {
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a new connection for `user_id`, returning the [`mpsc::Receiver`]
    /// the connection's writer task should drain. Buffer capacity is fixed at
    /// [`SEND_BUFFER_CAPACITY`].
    pub async fn register(&self, user_id: i64, conn_id: ConnectionId) -> mpsc::Receiver<PushEvent> {
        let (tx, rx) = mpsc::channel(SEND_BUFFER_CAPACITY);
        let _ = self
            .commands
            .send(Command::Register {
                user_id,
                conn_id,
                sender: tx,
            })
            .await;
        rx
    }

    pub async fn unregister(&self, user_id: i64, conn_id: ConnectionId) {
        let _ = self
            .commands
            .send(Command::Unregister { user_id, conn_id })
            .await;
    }

    pub async fn dispatch(&self, user_id: i64, event: PushEvent) {
        let _ = self.commands.send(Command::Dispatch { user_id, event }).await;
    }

    pub async fn broadcast(&self, event: PushEvent) {
        self.dispatch(BROADCAST_USER_ID, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(order_no: &str) -> PushEvent {
        PushEvent::OrderStatusChange {
            order_no: order_no.to_string(),
            old_status: "Pending".to_string(),
            new_status: "Cancelled".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_to_the_registered_connection() {
        let hub = Hub::spawn();
        let conn_id = hub.next_connection_id();
        let mut rx = hub.register(42, conn_id).await;

        hub.dispatch(42, sample_event("FS1")).await;

        let event = rx.recv().await.unwrap();
        matches!(event, PushEvent::OrderStatusChange { .. });
    }

    #[tokio::test]
    async fn most_recent_registration_wins_and_evicts_prior() {
        let hub = Hub::spawn();
        let first = hub.next_connection_id();
        let mut first_rx = hub.register(42, first).await;
        let second = hub.next_connection_id();
        let mut second_rx = hub.register(42, second).await;

        hub.dispatch(42, sample_event("FS2")).await;

        // the first connection's sender was dropped on re-registration, so
        // its receiver observes the channel closing rather than the event.
        assert!(first_rx.recv().await.is_none());
        assert!(second_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let hub = Hub::spawn();
        let mut receivers = Vec::new();
        for user in 1..=3i64 {
            let conn_id = hub.next_connection_id();
            receivers.push(hub.register(user, conn_id).await);
        }

        hub.broadcast(sample_event("FS3")).await;

        for rx in &mut receivers {
            assert!(rx.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn unregister_only_removes_the_matching_connection_id() {
        let hub = Hub::spawn();
        let stale = hub.next_connection_id();
        hub.register(7, stale).await;
        let current = hub.next_connection_id();
        let mut current_rx = hub.register(7, current).await;

        // an unregister referencing the stale id must not evict the newer one
        hub.unregister(7, stale).await;
        hub.dispatch(7, sample_event("FS4")).await;
        assert!(current_rx.recv().await.is_some());
    }
}
