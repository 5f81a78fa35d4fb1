//! HTTP API for the chat service
//!
//! Sessions are created and inspected with plain JSON; questions stream their
//! answers back as Server-Sent Events.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::{SessionManager, SharedRuntime};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub runtime: Arc<SharedRuntime>,
}

impl AppState {
    pub fn new(runtime: SharedRuntime) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new()),
            runtime: Arc::new(runtime),
        }
    }
}
