//! Pub/sub bridge for multi-instance deployments.
//!
//! Every relay instance subscribes to one broker channel at startup. Webhooks are
//! published to that channel instead of being broadcast directly, and each instance's
//! subscription feeds what it receives into its own local fan-out. A webhook ingested
//! by instance A therefore reaches viewers connected to instance B, without the two
//! sharing any in-process state.
//!
//! Reconnection is left to the Redis client: if the subscription stream ends, the
//! bridge logs it and stops relaying.

pub mod bridge;
pub mod publisher;

pub use bridge::{relay_payload, RedisBridge};
pub use publisher::RedisPublisher;
