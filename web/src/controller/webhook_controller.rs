//! Controller for the CI/CD pipeline webhook.
//!
//! The body is validated before anything else happens; a rejected payload never
//! reaches a viewer or the broker.

use crate::{AppState, Error};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use events::{EventDispatcher, NotificationEvent};
use log::*;
use serde::Serialize;

/// Response for webhook acknowledgment
#[derive(Debug, PartialEq, Serialize)]
pub struct WebhookResponse {
    pub message: String,
    /// Live viewers known to this instance after the dispatch.
    #[serde(rename = "clientCount")]
    pub client_count: usize,
}

/// Validates a raw webhook body and hands the event to the configured dispatcher.
pub(crate) async fn ingest(
    raw_body: &[u8],
    dispatcher: &dyn EventDispatcher,
) -> Result<WebhookResponse, Error> {
    let event = NotificationEvent::parse(raw_body)?;
    info!("Webhook received: {}", event.summary());

    let client_count = dispatcher.dispatch(&event).await?;

    Ok(WebhookResponse {
        message: "Webhook received".to_string(),
        client_count,
    })
}

/// POST /webhook
///
/// Takes the raw body rather than `Json<_>` so malformed payloads get our own 400
/// body instead of axum's rejection.
pub async fn receive(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, Error> {
    let response = ingest(&body, app_state.dispatcher.as_ref()).await?;
    Ok((StatusCode::OK, Json(response)))
}
