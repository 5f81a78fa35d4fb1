//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::analyst::{AnalystClient, AnalystError};
use crate::llm::{ChunkStream, CompletionClient, CompletionRequest, LlmError};
use crate::session::ProtocolMessage;
use crate::state_machine::Notice;
use crate::warehouse::{QueryResult, Warehouse, WarehouseError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// The renderer could not show a result table
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DisplayError(pub String);

/// Where notices and tables go while a turn runs.
///
/// Answer chunks are not rendered here; they travel on the returned stream.
pub trait Renderer: Send + Sync {
    fn notice(&self, notice: &Notice);

    fn show_table(&self, result: &QueryResult) -> Result<(), DisplayError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AnalystClient + ?Sized> AnalystClient for Arc<T> {
    async fn send(&self, messages: &[ProtocolMessage]) -> Result<Value, AnalystError> {
        (**self).send(messages).await
    }
}

#[async_trait]
impl<T: Warehouse + ?Sized> Warehouse for Arc<T> {
    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        (**self).execute(sql).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError> {
        (**self).stream_complete(request).await
    }
}

impl<T: Renderer + ?Sized> Renderer for Arc<T> {
    fn notice(&self, notice: &Notice) {
        (**self).notice(notice);
    }

    fn show_table(&self, result: &QueryResult) -> Result<(), DisplayError> {
        (**self).show_table(result)
    }
}
