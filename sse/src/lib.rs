//! Server-Sent Events (SSE) live-client registry and broadcast fan-out.
//!
//! This crate tracks which viewers are connected, keeps their streams alive, and pushes
//! pipeline notifications to all of them.
//!
//! # Architecture
//!
//! - **Connection handles**: every stream is written through a `ConnectionHandle`. The
//!   production handle feeds the channel an axum `Sse` response drains, which orders
//!   writes per connection.
//! - **Registry**: a `DashMap` keyed by `ConnectionId`. Broadcasts iterate a snapshot, so
//!   clients connecting mid-broadcast only see later events.
//! - **Heartbeats**: one keepalive task per connection, cancelled when the connection
//!   leaves the registry or a write fails.
//! - **Isolated fan-out**: a failed write evicts that client only; delivery to everyone
//!   else continues.
//! - **Ephemeral messages**: a viewer that is offline when an event is broadcast misses it.
//!
//! # Message Flow
//!
//! 1. A viewer opens `/events`; the handler registers a `ChannelHandle` with the `Manager`
//! 2. The `connected` frame is written, the connection is added, its heartbeat starts
//! 3. A webhook reaches an `EventDispatcher`. `LocalDispatcher` calls
//!    `Manager::broadcast_event` directly; in broker mode the subscription relays the
//!    channel payload through `Manager::broadcast`
//! 4. When the stream is dropped its `ConnectionGuard` unregisters the connection
//!
//! # Modules
//!
//! - `connection`: `ConnectionId`, `ConnectionHandle`, `ConnectionRegistry`
//! - `heartbeat`: per-connection keepalive tasks
//! - `broadcast`: snapshot fan-out with failure isolation
//! - `manager`: high-level entry point tying the above together
//! - `message`: SSE frame definitions
//! - `dispatcher`: single-instance `EventDispatcher`

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod manager;
pub mod message;

pub use broadcast::DeliveryReport;
pub use dispatcher::LocalDispatcher;
pub use manager::{ConnectionGuard, Manager};
