//! Notification Hub (NH, §4.5): a single long-running coordinator owning the
//! `user_id -> connection` map exclusively, reached only through three
//! ingress channels (register / unregister / dispatch).
//!
//! This is a deliberate departure from a directly shared
//! `DashMap<i64, Vec<(ConnectionId, WsSender)>>` (the idiom [`crate::reservation`]
//! uses for its own concurrent map, which is a fine fit there): NH
//! specifically needs single-writer ownership because connection lifecycle —
//! eviction on full buffer, most-recent-wins on duplicate registration — must
//! be serialized per user, and a coordinator task is the idiomatic way to get
//! that without a lock (§9).
//!
//! [`dispatcher::StatusDispatcher`] is the consumer side of the
//! `order_status_events` queue (§4.3): it is the only path that ever calls
//! [`HubHandle::dispatch`] for a status-change event, so worker/lifecycle
//! code publishes to the queue and never dispatches that event kind
//! directly.

pub mod dispatcher;
pub mod events;
pub mod hub;

pub use dispatcher::StatusDispatcher;
pub use events::PushEvent;
pub use hub::{ConnectionId, Hub, HubHandle};
