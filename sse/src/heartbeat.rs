use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::message::Frame;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Default keepalive period. Must stay below the idle timeout of any proxy in front of
/// the relay (10s upstream by default).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(8);

/// Keepalive tasks, one per open connection, keyed by connection id.
///
/// A task stops on its own as soon as its connection is missing from the registry or a
/// heartbeat write fails; `stop` cancels it immediately.
pub struct Heartbeats {
    tasks: DashMap<ConnectionId, AbortHandle>,
}

impl Heartbeats {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Spawns the keepalive loop for a connection that was just added to `registry`.
    pub fn start(
        self: &Arc<Self>,
        registry: Arc<ConnectionRegistry>,
        connection_id: ConnectionId,
        interval: Duration,
    ) {
        let heartbeats = Arc::clone(self);
        let task_id = connection_id.clone();

        // The shard stays locked until the handle is stored, so a task that finishes
        // straight away can only remove its own entry after it exists.
        let slot = self.tasks.entry(connection_id);
        let handle = tokio::spawn(async move {
            beat(&registry, &task_id, interval).await;
            heartbeats.tasks.remove(&task_id);
        })
        .abort_handle();

        if let Entry::Occupied(previous) = &slot {
            previous.get().abort();
        }
        slot.insert(handle);
    }

    /// Cancels the keepalive loop for a connection. Returns whether one was tracked.
    pub fn stop(&self, connection_id: &ConnectionId) -> bool {
        match self.tasks.remove(connection_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, connection_id: &ConnectionId) -> bool {
        self.tasks
            .get(connection_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of keepalive loops still running.
    pub fn active(&self) -> usize {
        self.tasks
            .iter()
            .filter(|handle| !handle.value().is_finished())
            .count()
    }
}

impl Default for Heartbeats {
    fn default() -> Self {
        Self::new()
    }
}

/// RUNNING: write a heartbeat, sleep, repeat. A single failed write is treated as a
/// dead connection: evict it and stop without retrying.
async fn beat(registry: &ConnectionRegistry, connection_id: &ConnectionId, interval: Duration) {
    loop {
        let Some(entry) = registry.get(connection_id) else {
            debug!("Connection {connection_id} is gone, stopping heartbeat");
            return;
        };

        if let Err(e) = entry.handle.send(Frame::heartbeat()) {
            warn!("Heartbeat failed for connection {connection_id}: {e}. Removing connection.");
            registry.remove(connection_id);
            return;
        }
        trace!("Heartbeat sent to connection {connection_id}");

        drop(entry);
        tokio::time::sleep(interval).await;
    }
}
