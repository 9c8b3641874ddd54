use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::message::Frame;
use log::*;

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections in the snapshot the pass iterated.
    pub attempted: usize,
    /// Connections whose write failed; already evicted from the registry.
    pub failed: Vec<ConnectionId>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed.len()
    }
}

/// Writes `frame` to every connection in a snapshot of `registry`.
///
/// Each write is isolated: a failure is recorded and the pass carries on. Failed
/// connections are removed once the pass is over. Connections added while the pass is
/// running are not part of the snapshot and don't receive this frame.
pub fn broadcast(registry: &ConnectionRegistry, frame: &Frame) -> DeliveryReport {
    let snapshot = registry.snapshot();
    let mut report = DeliveryReport {
        attempted: snapshot.len(),
        failed: Vec::new(),
    };

    for entry in snapshot {
        if let Err(e) = entry.handle.send(frame.clone()) {
            warn!(
                "Failed to send {} to connection {}: {}. Connection will be removed.",
                frame.id, entry.id, e
            );
            report.failed.push(entry.id);
        }
    }

    for connection_id in &report.failed {
        registry.remove(connection_id);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::RecordingHandle;
    use crate::connection::{ClientEntry, ConnectionHandle};
    use crate::message::FrameKind;
    use events::{Error, NotificationEvent};
    use std::sync::{Arc, Mutex};

    fn frame() -> Frame {
        Frame::notification(&NotificationEvent::new("build", "app", "success"))
    }

    fn add(registry: &ConnectionRegistry, handle: Arc<dyn ConnectionHandle>) -> ConnectionId {
        let entry = ClientEntry::new(handle);
        let id = entry.id.clone();
        registry.add(entry);
        id
    }

    #[test]
    fn test_empty_registry_is_a_no_op() {
        let registry = ConnectionRegistry::new();

        let report = broadcast(&registry, &frame());

        assert_eq!(report, DeliveryReport::default());
        assert_eq!(report.delivered(), 0);
    }

    #[test]
    fn test_failures_are_isolated_and_evicted() {
        let registry = ConnectionRegistry::new();
        let healthy: Vec<_> = (0..5).map(|_| RecordingHandle::open()).collect();
        for handle in &healthy {
            add(&registry, handle.clone());
        }
        let broken_ids: Vec<_> = (0..3)
            .map(|_| add(&registry, RecordingHandle::broken()))
            .collect();

        let report = broadcast(&registry, &frame());

        assert_eq!(report.attempted, 8);
        assert_eq!(report.delivered(), 5);
        assert_eq!(report.failed.len(), 3);
        for id in &broken_ids {
            assert!(report.failed.contains(id));
            assert!(!registry.contains(id));
        }
        for handle in &healthy {
            assert_eq!(handle.frames_of(FrameKind::Notification).len(), 1);
        }
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_every_recipient_gets_its_own_copy() {
        let registry = ConnectionRegistry::new();
        let first = RecordingHandle::open();
        let second = RecordingHandle::open();
        add(&registry, first.clone());
        add(&registry, second.clone());
        let frame = frame();

        broadcast(&registry, &frame);

        assert_eq!(first.frames(), vec![frame.clone()]);
        assert_eq!(second.frames(), vec![frame]);
    }

    /// Registers a new connection the first time it is written to, mimicking a client
    /// that connects while a broadcast pass is in flight.
    struct ConnectsDuringBroadcast {
        registry: Arc<ConnectionRegistry>,
        latecomer: Arc<RecordingHandle>,
        latecomer_id: Mutex<Option<ConnectionId>>,
    }

    impl ConnectionHandle for ConnectsDuringBroadcast {
        fn send(&self, _frame: Frame) -> Result<(), Error> {
            let mut latecomer_id = self.latecomer_id.lock().unwrap();
            if latecomer_id.is_none() {
                *latecomer_id = Some(add(&self.registry, self.latecomer.clone()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_connection_added_mid_broadcast_misses_in_flight_event() {
        let registry = Arc::new(ConnectionRegistry::new());
        let latecomer = RecordingHandle::open();
        let trigger = Arc::new(ConnectsDuringBroadcast {
            registry: Arc::clone(&registry),
            latecomer: latecomer.clone(),
            latecomer_id: Mutex::new(None),
        });
        add(&registry, trigger.clone());

        let report = broadcast(&registry, &frame());

        assert_eq!(report.attempted, 1);
        assert_eq!(registry.len(), 2);
        assert!(latecomer.frames().is_empty());

        // The next broadcast starts after the addition and reaches it
        broadcast(&registry, &frame());
        assert_eq!(latecomer.frames_of(FrameKind::Notification).len(), 1);
    }
}
