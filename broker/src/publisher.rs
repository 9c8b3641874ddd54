use async_trait::async_trait;
use events::error::{broker_error, BrokerErrorKind};
use events::{Error, EventDispatcher, NotificationEvent};
use log::*;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use sse::Manager;
use std::sync::Arc;

/// Multi-instance dispatcher: publishes ingested events to the broker channel.
///
/// The publishing instance receives its own message back through its subscription,
/// so local viewers are served the same way as remote ones.
#[derive(Clone)]
pub struct RedisPublisher {
    connection: MultiplexedConnection,
    channel: String,
    sse_manager: Arc<Manager>,
}

impl RedisPublisher {
    pub(crate) fn new(
        connection: MultiplexedConnection,
        channel: String,
        sse_manager: Arc<Manager>,
    ) -> Self {
        Self {
            connection,
            channel,
            sse_manager,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Wire format shared by every instance on the channel.
pub fn encode(event: &NotificationEvent) -> Result<String, Error> {
    event
        .to_json()
        .map_err(|e| broker_error(BrokerErrorKind::Payload, e))
}

#[async_trait]
impl EventDispatcher for RedisPublisher {
    /// Publishes once, without retrying. Only this instance's viewers are counted;
    /// other instances' connections are not visible here.
    async fn dispatch(&self, event: &NotificationEvent) -> Result<usize, Error> {
        let payload = encode(event)?;
        let mut connection = self.connection.clone();

        let receivers: i64 = connection
            .publish(&self.channel, &payload)
            .await
            .map_err(|e| {
                error!("Failed to publish message to channel {}: {e}", self.channel);
                broker_error(BrokerErrorKind::Publish, e)
            })?;

        debug!(
            "Published {} to channel {} ({receivers} subscriber(s))",
            event.summary(),
            self.channel
        );
        Ok(self.sse_manager.client_count())
    }
}
