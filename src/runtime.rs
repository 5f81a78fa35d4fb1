//! Runtime for executing turns
//!
//! Owns the per-session locks and the executor that drives one question
//! through the state machine.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{AnswerStream, TurnRuntime};
pub use traits::*;

use crate::analyst::AnalystClient;
use crate::llm::CompletionClient;
use crate::session::Session;
use crate::warehouse::Warehouse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Type alias for production runtime with boxed implementations
pub type SharedRuntime =
    TurnRuntime<Arc<dyn AnalystClient>, Arc<dyn Warehouse>, Arc<dyn CompletionClient>>;

/// Handle to one session. A turn holds the lock for its whole duration,
/// streaming included.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Independent sessions keyed by id.
///
/// Sessions live until they are removed; nothing evicts idle ones.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session and return its id
    pub async fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(Session::new())));
        tracing::info!(session_id = %id, "Session created");
        id
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Get a session, creating it under the given id if it does not exist
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        // Check if already present
        if let Some(handle) = self.get(id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = %id, "Session created on first use");
                Arc::new(Mutex::new(Session::new()))
            })
            .clone()
    }

    /// Drop a session. Returns false if the id was unknown.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session removed");
        }
        removed
    }
}
