//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the `/events` endpoint.
//! The registry, heartbeat and fan-out machinery lives in the `sse` crate.

pub(crate) mod handler;
