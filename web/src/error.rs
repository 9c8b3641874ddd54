use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use events::error::{Error as EventsError, ErrorKind};
use log::*;
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(EventsError);

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0.error_kind
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            ErrorKind::Validation => {
                warn!("Rejecting webhook: {}", self.0);
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid webhook payload" })),
                )
                    .into_response()
            }
            ErrorKind::Broker(_) => {
                error!("Webhook error: {}", self.0);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "Failed to publish webhook" })),
                )
                    .into_response()
            }
            ErrorKind::Unavailable => {
                warn!("Refusing request: {}", self.0);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "Service Unavailable" })),
                )
                    .into_response()
            }
            ErrorKind::Delivery => {
                error!("Event stream error: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<EventsError> for Error {
    fn from(err: EventsError) -> Self {
        Self(err)
    }
}
