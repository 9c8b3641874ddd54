use axum::{extract::Request, middleware::Next, response::Response};
use log::*;
use std::time::Instant;

/// Logs one line per request. For `/events` the line is written when the stream
/// starts, not when it ends.
pub(crate) async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
