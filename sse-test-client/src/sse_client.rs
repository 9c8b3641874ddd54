use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Frames without an `event:` line are reported under this name.
pub const UNNAMED_EVENT: &str = "message";

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
    pub timestamp: Instant,
}

impl Event {
    pub fn message(&self) -> Option<&str> {
        self.data["message"].as_str()
    }

    /// Local mode sends a `{"message": "Job: ..."}` summary, broker mode relays the
    /// webhook payload itself. Either one names the job.
    pub fn mentions(&self, needle: &str) -> bool {
        self.data.to_string().contains(needle)
    }

    pub fn is_heartbeat(&self) -> bool {
        self.data["type"] == "heartbeat"
    }
}

pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, label: String) -> Result<Self> {
        let url = format!("{}/events", base_url);
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(&url)?.build();

        let stream_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        let data = match serde_json::from_str(&event.data) {
                            Ok(data) => data,
                            Err(e) => {
                                warn!("Non-JSON frame for {}: {}", stream_label, e);
                                continue;
                            }
                        };
                        let sse_event = Event {
                            event_type: event.event_type,
                            data,
                            timestamp: Instant::now(),
                        };

                        if tx.send(sse_event).is_err() {
                            debug!("SSE receiver dropped for {}", stream_label);
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Comments and connection notices
                    }
                    Some(Err(e)) => {
                        warn!("SSE error for {}: {}", stream_label, e);
                    }
                    None => {
                        debug!("SSE stream ended for {}", stream_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            _handle: handle,
        })
    }

    pub async fn wait_for_event(&mut self, event_type: &str, timeout: Duration) -> Result<Event> {
        self.wait_for(timeout, |event| event.event_type == event_type)
            .await
            .map_err(|e| anyhow::anyhow!("{} waiting for event: {}", e, event_type))
    }

    /// Waits for a notification mentioning `needle`. Notifications for other jobs are
    /// skipped.
    pub async fn wait_for_notification(&mut self, needle: &str, timeout: Duration) -> Result<Event> {
        self.wait_for(timeout, |event| {
            event.event_type == "notification" && event.mentions(needle)
        })
        .await
        .map_err(|e| anyhow::anyhow!("{} waiting for notification about {}", e, needle))
    }

    pub async fn wait_for_heartbeat(&mut self, timeout: Duration) -> Result<Event> {
        self.wait_for(timeout, Event::is_heartbeat)
            .await
            .map_err(|e| anyhow::anyhow!("{} waiting for heartbeat", e))
    }

    /// Fails if a notification mentioning `needle` arrives within `window`.
    pub async fn expect_no_notification(&mut self, needle: &str, window: Duration) -> Result<()> {
        match self
            .wait_for(window, |event| {
                event.event_type == "notification" && event.mentions(needle)
            })
            .await
        {
            Ok(event) => anyhow::bail!("Unexpected notification: {}", event.data),
            Err(_) => Ok(()),
        }
    }

    async fn wait_for<F>(&mut self, timeout: Duration, matches: F) -> Result<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout");
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if matches(&event) => {
                    return Ok(event);
                }
                Ok(Some(_)) => {
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("SSE connection closed");
                }
                Err(_) => {
                    anyhow::bail!("Timeout");
                }
            }
        }
    }
}
