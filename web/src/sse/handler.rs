use crate::{AppState, Error};
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::Stream;
use log::*;
use sse::connection::ChannelHandle;
use sse::ConnectionGuard;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

/// SSE handler that establishes a long-lived connection for pipeline notifications.
///
/// Keepalive frames come from the connection's heartbeat task rather than axum's
/// `KeepAlive`, so a dead stream is noticed and evicted on the next failed write.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let manager = Arc::clone(&app_state.sse_manager);
    let connection_id = manager.register_connection(Arc::new(ChannelHandle::new(tx)))?;
    debug!("Established SSE connection {connection_id}");

    // Dropped together with the stream when the client goes away
    let guard = ConnectionGuard::new(manager, connection_id);

    let stream = stream! {
        let guard = guard;
        while let Some(event) = rx.recv().await {
            yield event;
        }
        debug!("SSE connection {} closed by server", guard.connection_id());
    };

    Ok(Sse::new(stream))
}
