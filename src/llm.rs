//! Summarization (completion) service abstraction
//!
//! Turns a prompt into a stream of answer chunks.

mod cortex;
mod error;
mod types;

pub use cortex::CortexCompleteService;
pub use error::{LlmError, LlmErrorKind};
pub use types::*;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Incremental answer text
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Common interface for completion providers
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Start a completion. Errors before the first chunk are returned here;
    /// later failures arrive as items of the stream.
    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError>;
}

/// Logging wrapper for completion services
pub struct LoggingService {
    inner: Arc<dyn CompletionClient>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CompletionClient for LoggingService {
    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.stream_complete(request).await;
        let duration = start.elapsed();

        match result {
            Ok(stream) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    stream = request.options.stream,
                    "Completion started"
                );
                let model = request.model.clone();
                Ok(Box::pin(stream.inspect(move |item| {
                    if let Err(e) = item {
                        tracing::error!(
                            model = %model,
                            error = %e.message,
                            kind = ?e.kind,
                            "Completion stream failed"
                        );
                    }
                })))
            }
            Err(e) => {
                if e.kind.is_transient() {
                    tracing::warn!(
                        model = %request.model,
                        duration_ms = %duration.as_millis(),
                        kind = ?e.kind,
                        error = %e.message,
                        retry_after = ?e.retry_after,
                        "Completion request failed"
                    );
                } else {
                    tracing::error!(
                        model = %request.model,
                        duration_ms = %duration.as_millis(),
                        kind = ?e.kind,
                        error = %e.message,
                        "Completion request failed"
                    );
                }
                Err(e)
            }
        }
    }
}
