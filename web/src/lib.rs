//! HTTP surface of the relay: the SSE endpoint viewers hold open, the webhook the
//! CI/CD backend posts to, and a couple of informational routes.

use events::EventDispatcher;
use service::config::Config;
use ::sse::Manager;
use std::sync::Arc;

mod controller;
mod error;
mod middleware;
pub mod router;
mod sse;

pub use error::{Error, Result};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<Manager>,
    /// Either local fan-out or broker publish, selected once at startup.
    pub dispatcher: Arc<dyn EventDispatcher>,
}

impl AppState {
    pub fn new(
        app_config: Config,
        sse_manager: Arc<Manager>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            config: app_config,
            sse_manager,
            dispatcher,
        }
    }
}
