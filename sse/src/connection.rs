use crate::message::Frame;
use axum::response::sse::Event;
use dashmap::DashMap;
use events::error::delivery_error;
use events::Error;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write side of one client's event stream.
///
/// A failed write is conclusive: the transport is gone and the connection must be
/// evicted. Implementations must serialize their own writes.
pub trait ConnectionHandle: Send + Sync {
    fn send(&self, frame: Frame) -> Result<(), Error>;
}

/// Handle backed by the channel an SSE response stream drains. The channel orders
/// heartbeat and broadcast writes on the same connection.
pub struct ChannelHandle {
    sender: UnboundedSender<Result<Event, Infallible>>,
}

impl ChannelHandle {
    pub fn new(sender: UnboundedSender<Result<Event, Infallible>>) -> Self {
        Self { sender }
    }
}

impl ConnectionHandle for ChannelHandle {
    fn send(&self, frame: Frame) -> Result<(), Error> {
        self.sender
            .send(Ok(frame.into_event()))
            .map_err(|_| delivery_error("SSE stream receiver dropped"))
    }
}

/// A live client, owned exclusively by the registry.
#[derive(Clone)]
pub struct ClientEntry {
    pub id: ConnectionId,
    pub handle: Arc<dyn ConnectionHandle>,
}

impl ClientEntry {
    pub fn new(handle: Arc<dyn ConnectionHandle>) -> Self {
        Self {
            id: ConnectionId::new(),
            handle,
        }
    }
}

impl fmt::Debug for ClientEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientEntry").field("id", &self.id).finish()
    }
}

/// Concurrent registry of open connections.
///
/// An id is present iff its transport is believed open; absence is what stops the
/// connection's heartbeat.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ClientEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection under its id - O(1)
    pub fn add(&self, entry: ClientEntry) {
        self.connections.insert(entry.id.clone(), entry);
    }

    /// Returns whether the connection was present. Removing twice is a no-op.
    pub fn remove(&self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    /// Point-in-time copy of all entries; later adds and removes don't affect it.
    pub fn snapshot(&self) -> Vec<ClientEntry> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<ClientEntry> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
