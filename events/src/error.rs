//! Error types shared by the relay crates.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding an
//! `error_kind` tree and an optional `source` for error chaining. The `web` layer
//! maps the kinds onto HTTP responses.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the relay.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The webhook body did not describe a pipeline event. Detected before any side effect.
    Validation,
    /// A single client's stream could not be written to. Handled locally by evicting
    /// that client; never surfaced to the webhook caller.
    Delivery,
    /// Failure talking to the pub/sub broker.
    Broker(BrokerErrorKind),
    /// The relay is shutting down and accepts no new connections.
    Unavailable,
}

/// Errors from the pub/sub broker bridge.
#[derive(Debug, PartialEq)]
pub enum BrokerErrorKind {
    Connect,
    Subscribe,
    Publish,
    Payload,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let detail = self
            .source
            .as_ref()
            .map(|source| source.to_string())
            .unwrap_or_default();

        match &self.error_kind {
            ErrorKind::Validation => write!(f, "Validation error: {detail}"),
            ErrorKind::Delivery => write!(f, "Delivery error: {detail}"),
            ErrorKind::Broker(kind) => write!(f, "Broker error ({kind:?}): {detail}"),
            ErrorKind::Unavailable => write!(f, "Unavailable: {detail}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Helper function to create validation errors.
pub fn validation_error<E>(source: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(source.into()),
        error_kind: ErrorKind::Validation,
    }
}

/// Helper function to create delivery errors.
pub fn delivery_error<E>(source: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(source.into()),
        error_kind: ErrorKind::Delivery,
    }
}

/// Helper function to create unavailable errors.
pub fn unavailable_error<E>(source: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(source.into()),
        error_kind: ErrorKind::Unavailable,
    }
}

/// Helper function to create broker errors.
pub fn broker_error<E>(kind: BrokerErrorKind, source: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(source.into()),
        error_kind: ErrorKind::Broker(kind),
    }
}
