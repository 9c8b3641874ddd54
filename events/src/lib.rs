//! Event system infrastructure for the CI/CD alert relay.
//!
//! This crate holds the pieces every other layer agrees on, and nothing else:
//!
//! - **NotificationEvent**: the pipeline status record carried by a webhook
//! - **EventDispatcher**: the single seam through which an ingested event is fanned out,
//!   either directly to local SSE clients or through the pub/sub broker
//! - **Error**: the shared error tree
//!
//! It has no dependencies on internal crates, avoiding circular dependencies between
//! `sse`, `broker` and `web`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod error;

pub use error::Error;

use error::validation_error;

/// A pipeline job status change reported by the CI/CD backend.
///
/// Built once per webhook and never mutated afterwards; every recipient renders its
/// own frame from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub status: String,
    pub job_name: String,
    pub project: String,
}

impl NotificationEvent {
    pub fn new(
        job_name: impl Into<String>,
        project: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            status: status.into(),
            job_name: job_name.into(),
            project: project.into(),
        }
    }

    /// Parses a raw webhook body. All three fields must be present and be strings;
    /// unknown extra fields are ignored.
    pub fn parse(raw_body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(raw_body).map_err(validation_error)
    }

    /// Serializes the event for transport between relay instances.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Human readable line pushed to viewers.
    pub fn summary(&self) -> String {
        format!(
            "Job: {}, Project: {}, Status: {}",
            self.job_name, self.project, self.status
        )
    }
}

/// Fans an ingested event out to viewers.
///
/// Implementations return the number of live clients they know about after the
/// dispatch. A broker-backed dispatcher can only see its own instance's clients.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: &NotificationEvent) -> Result<usize, Error>;
}
