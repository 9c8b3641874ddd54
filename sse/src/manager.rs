use crate::broadcast::{self, DeliveryReport};
use crate::connection::{ClientEntry, ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::heartbeat::{Heartbeats, DEFAULT_HEARTBEAT_INTERVAL};
use crate::message::Frame;
use events::error::unavailable_error;
use events::{Error, NotificationEvent};
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Owns the connection registry and the keepalive loops, and is the only entry point
/// for connecting, disconnecting and broadcasting.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    heartbeats: Arc<Heartbeats>,
    heartbeat_interval: Duration,
    /// Set once shutdown begins; no connection is accepted afterwards.
    closing: AtomicBool,
}

impl Manager {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            heartbeats: Arc::new(Heartbeats::new()),
            heartbeat_interval,
            closing: AtomicBool::new(false),
        }
    }

    /// Register a new connection and return its unique ID.
    ///
    /// The `connected` frame is written before the connection becomes visible to
    /// broadcasts, so it is always the first frame on the stream.
    pub fn register_connection(
        &self,
        handle: Arc<dyn ConnectionHandle>,
    ) -> Result<ConnectionId, Error> {
        if self.is_closing() {
            return Err(unavailable_error("relay is shutting down"));
        }

        let entry = ClientEntry::new(handle);
        let connection_id = entry.id.clone();

        entry.handle.send(Frame::connected())?;
        self.registry.add(entry);
        self.heartbeats.start(
            Arc::clone(&self.registry),
            connection_id.clone(),
            self.heartbeat_interval,
        );

        // disconnect_all may have taken its snapshot before the add above
        if self.is_closing() {
            self.unregister_connection(&connection_id);
            return Err(unavailable_error("relay is shutting down"));
        }

        info!(
            "Client {connection_id} connected ({} connected)",
            self.registry.len()
        );
        Ok(connection_id)
    }

    /// Unregister a connection by ID, stopping its heartbeat. Returns whether it was
    /// still registered.
    pub fn unregister_connection(&self, connection_id: &ConnectionId) -> bool {
        self.heartbeats.stop(connection_id);
        let removed = self.registry.remove(connection_id);
        if removed {
            info!("Client {connection_id} disconnected");
        }
        removed
    }

    /// Fan a frame out to every connected client, evicting the ones that fail.
    pub fn broadcast(&self, frame: &Frame) -> DeliveryReport {
        let report = broadcast::broadcast(&self.registry, frame);
        for connection_id in &report.failed {
            self.heartbeats.stop(connection_id);
        }
        report
    }

    pub fn broadcast_event(&self, event: &NotificationEvent) -> DeliveryReport {
        let report = self.broadcast(&Frame::notification(event));
        debug!(
            "Broadcast {} to {} of {} client(s)",
            event.summary(),
            report.delivered(),
            report.attempted
        );
        report
    }

    /// Ends every open stream and refuses new ones. Used on shutdown so graceful
    /// shutdown doesn't wait on connections that never finish on their own.
    pub fn disconnect_all(&self) -> usize {
        self.closing.store(true, Ordering::SeqCst);
        self.registry
            .snapshot()
            .iter()
            .filter(|entry| self.unregister_connection(&entry.id))
            .count()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.registry.contains(connection_id)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// Unregisters its connection when dropped. Moved into an SSE response stream so the
/// connection is released as soon as the client goes away.
pub struct ConnectionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn new(manager: Arc<Manager>, connection_id: ConnectionId) -> Self {
        Self {
            manager,
            connection_id,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister_connection(&self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::RecordingHandle;
    use crate::message::FrameKind;
    use events::error::ErrorKind;

    const INTERVAL: Duration = Duration::from_secs(8);

    #[tokio::test(start_paused = true)]
    async fn test_connected_is_the_first_frame() {
        let manager = Manager::new(INTERVAL);
        let handle = RecordingHandle::open();

        manager.register_connection(handle.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let frames = handle.frames();
        assert_eq!(frames[0].kind, FrameKind::Connected);
        assert_eq!(frames[1].kind, FrameKind::Heartbeat);
    }

    #[tokio::test]
    async fn test_register_fails_for_dead_stream() {
        let manager = Manager::new(INTERVAL);

        assert!(manager.register_connection(RecordingHandle::broken()).is_err());
        assert_eq!(manager.client_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_event_reaches_every_client() {
        let manager = Manager::new(INTERVAL);
        let handles: Vec<_> = (0..3).map(|_| RecordingHandle::open()).collect();
        for handle in &handles {
            manager.register_connection(handle.clone()).unwrap();
        }

        let report = manager.broadcast_event(&NotificationEvent::new("build", "app", "success"));

        assert_eq!(report.attempted, 3);
        assert!(report.failed.is_empty());
        for handle in &handles {
            let notifications = handle.frames_of(FrameKind::Notification);
            assert_eq!(notifications.len(), 1);
            assert!(notifications[0]
                .data
                .contains("Job: build, Project: app, Status: success"));
        }
    }

    #[tokio::test]
    async fn test_failed_broadcast_stops_heartbeat() {
        let manager = Manager::new(INTERVAL);
        let handle = RecordingHandle::open();
        let id = manager.register_connection(handle.clone()).unwrap();

        handle.close();
        let report = manager.broadcast_event(&NotificationEvent::new("build", "app", "failed"));

        assert_eq!(report.failed, vec![id.clone()]);
        assert!(!manager.is_connected(&id));
        assert!(!manager.heartbeats.is_running(&id));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let manager = Manager::new(INTERVAL);
        let id = manager
            .register_connection(RecordingHandle::open())
            .unwrap();

        assert!(manager.unregister_connection(&id));
        assert!(!manager.unregister_connection(&id));
        assert_eq!(manager.client_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_all_empties_registry() {
        let manager = Manager::new(INTERVAL);
        let ids: Vec<_> = (0..3)
            .map(|_| manager.register_connection(RecordingHandle::open()).unwrap())
            .collect();

        assert_eq!(manager.disconnect_all(), 3);
        assert_eq!(manager.client_count(), 0);
        for id in &ids {
            assert!(!manager.heartbeats.is_running(id));
        }
    }

    #[tokio::test]
    async fn test_no_connection_is_accepted_after_disconnect_all() {
        let manager = Manager::new(INTERVAL);
        manager.disconnect_all();
        let late = RecordingHandle::open();

        let err = manager.register_connection(late.clone()).unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Unavailable);
        assert_eq!(manager.client_count(), 0);
        assert!(late.frames().is_empty());
        assert_eq!(manager.heartbeats.active(), 0);
    }

    #[tokio::test]
    async fn test_guard_unregisters_on_drop() {
        let manager = Arc::new(Manager::new(INTERVAL));
        let id = manager
            .register_connection(RecordingHandle::open())
            .unwrap();
        let guard = ConnectionGuard::new(Arc::clone(&manager), id.clone());

        assert!(manager.is_connected(guard.connection_id()));
        drop(guard);

        assert!(!manager.is_connected(&id));
        assert!(!manager.heartbeats.is_running(&id));
    }
}
