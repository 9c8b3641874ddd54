use crate::Manager;
use async_trait::async_trait;
use events::{Error, EventDispatcher, NotificationEvent};
use std::sync::Arc;

/// Single-instance dispatcher: broadcasts ingested events straight to this process's
/// SSE clients.
pub struct LocalDispatcher {
    sse_manager: Arc<Manager>,
}

impl LocalDispatcher {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

#[async_trait]
impl EventDispatcher for LocalDispatcher {
    /// Returns the number of clients still connected once failed ones were evicted.
    async fn dispatch(&self, event: &NotificationEvent) -> Result<usize, Error> {
        self.sse_manager.broadcast_event(event);
        Ok(self.sse_manager.client_count())
    }
}
