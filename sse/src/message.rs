use axum::response::sse::Event;
use events::NotificationEvent;
use serde_json::json;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Connected,
    Heartbeat,
    Notification,
}

impl EventType for FrameKind {
    fn event_type(&self) -> &'static str {
        match self {
            FrameKind::Connected => "connected",
            FrameKind::Heartbeat => "heartbeat",
            FrameKind::Notification => "notification",
        }
    }
}

/// One named SSE frame, rendered independently for every recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub id: String,
    pub data: String,
}

impl Frame {
    fn new(kind: FrameKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            id: next_frame_id(),
            data: data.to_string(),
        }
    }

    /// First frame on every stream.
    pub fn connected() -> Self {
        Self::new(
            FrameKind::Connected,
            json!({ "message": "Connected to SSE stream" }),
        )
    }

    pub fn heartbeat() -> Self {
        Self::new(FrameKind::Heartbeat, json!({ "type": "heartbeat" }))
    }

    pub fn notification(event: &NotificationEvent) -> Self {
        Self::new(
            FrameKind::Notification,
            json!({ "message": event.summary() }),
        )
    }

    /// Notification carrying a channel payload verbatim, as relayed between instances.
    pub fn raw_notification(payload: &str) -> Self {
        Self {
            kind: FrameKind::Notification,
            id: next_frame_id(),
            data: payload.to_owned(),
        }
    }

    pub fn into_event(self) -> Event {
        Event::default()
            .event(self.kind.event_type())
            .id(self.id)
            .data(self.data)
    }
}

// Millisecond timestamps are unique enough for client-side de-duplication.
fn next_frame_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
