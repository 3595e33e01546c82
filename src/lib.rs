//! flash_rush - server-side core of a flash-sale e-commerce platform.
//!
//! # Modules
//!
//! - [`domain`] - Activity/Order types and their state machines
//! - [`reservation`] - Reservation Store (RS): atomic stock/lock primitives
//! - [`queue`] - Order Queue (OQ): partitioned at-least-once FIFO
//! - [`store`] - Durable Store (DS) contract and its Postgres backend
//! - [`notify`] - Notification Hub (NH): per-user push event fanout
//! - [`admission`] - Admission Handler (AH): the synchronous rush path
//! - [`worker`] - Order Worker (OW): asynchronous order creation
//! - [`lifecycle`] - Lifecycle Scheduler (LS): activity ticks, order reaping
//! - [`ids`] - Distributed snowflake id generation
//! - [`auth`] - Bearer JWT verification
//! - [`config`] - Environment-based process configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Unified error taxonomy and HTTP envelope
//! - [`gateway`] - HTTP surface: handlers, router assembly, shared state

pub mod admission;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod queue;
pub mod reservation;
pub mod store;
pub mod worker;
