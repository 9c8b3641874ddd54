use crate::publisher::RedisPublisher;
use events::error::{broker_error, BrokerErrorKind};
use events::{Error, NotificationEvent};
use futures::StreamExt;
use log::*;
use redis::aio::PubSub;
use sse::message::Frame;
use sse::{DeliveryReport, Manager};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Process-wide broker connection: one publishing connection plus the subscription task.
pub struct RedisBridge {
    publisher: RedisPublisher,
    subscription: JoinHandle<()>,
}

impl RedisBridge {
    /// Connects to the broker and subscribes to `channel`.
    ///
    /// Any failure here must abort startup: running with a bridge that cannot publish
    /// or cannot receive would silently drop events.
    pub async fn connect(
        redis_url: &str,
        channel: &str,
        sse_manager: Arc<Manager>,
    ) -> Result<Self, Error> {
        info!("Initializing Redis client");
        let client = redis::Client::open(redis_url).map_err(|e| {
            error!("Invalid Redis URL: {e}");
            broker_error(BrokerErrorKind::Connect, e)
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!("Failed to initialize Redis client: {e}");
                broker_error(BrokerErrorKind::Connect, e)
            })?;
        info!("Redis connection established");

        let mut pubsub = client.get_async_pubsub().await.map_err(|e| {
            error!("Failed to open Redis subscriber connection: {e}");
            broker_error(BrokerErrorKind::Connect, e)
        })?;
        pubsub.subscribe(channel).await.map_err(|e| {
            error!("Failed to subscribe to Redis channel {channel}: {e}");
            broker_error(BrokerErrorKind::Subscribe, e)
        })?;
        info!("Successfully subscribed to Redis channel: {channel}");

        let subscription = tokio::spawn(relay_messages(
            pubsub,
            channel.to_owned(),
            Arc::clone(&sse_manager),
        ));

        Ok(Self {
            publisher: RedisPublisher::new(connection, channel.to_owned(), sse_manager),
            subscription,
        })
    }

    /// Dispatcher publishing to the bridged channel.
    pub fn publisher(&self) -> RedisPublisher {
        self.publisher.clone()
    }

    /// Stops relaying channel messages to local viewers.
    pub fn shutdown(&self) {
        info!(
            "Shutting down Redis subscription to {}",
            self.publisher.channel()
        );
        self.subscription.abort();
    }
}

async fn relay_messages(mut pubsub: PubSub, channel: String, sse_manager: Arc<Manager>) {
    let mut messages = pubsub.on_message();

    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Invalid payload on channel {channel}: {e}");
                continue;
            }
        };

        debug!("Received message on {channel}: {payload}");
        if let Err(e) = relay_payload(&sse_manager, &payload) {
            warn!("Dropping message from channel {channel}: {e}");
        }
    }

    error!("Redis subscription to {channel} ended, events from other instances will no longer be relayed");
}

/// Checks that one channel message decodes, then broadcasts it verbatim to this
/// instance's viewers.
pub fn relay_payload(sse_manager: &Manager, payload: &str) -> Result<DeliveryReport, Error> {
    let event: NotificationEvent = serde_json::from_str(payload)
        .map_err(|e| broker_error(BrokerErrorKind::Payload, e))?;

    let report = sse_manager.broadcast(&Frame::raw_notification(payload));
    debug!(
        "Relayed {} to {} of {} client(s)",
        event.summary(),
        report.delivered(),
        report.attempted
    );
    Ok(report)
}
