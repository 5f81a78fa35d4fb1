//! Snowflake Cortex complete provider

use super::types::{CompletionRequest, PromptMessage};
use super::{ChunkStream, CompletionClient, LlmError, LlmErrorKind};
use crate::snowflake::SnowflakeConnection;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::future;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const COMPLETE_PATH: &str = "/api/v2/cortex/inference:complete";
const DONE_MARKER: &str = "[DONE]";

/// Cortex complete service
pub struct CortexCompleteService {
    connection: SnowflakeConnection,
}

impl CortexCompleteService {
    pub fn new(connection: SnowflakeConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CompletionClient for CortexCompleteService {
    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError> {
        let body = CortexRequest::from(request);

        let mut builder = self.connection.post(COMPLETE_PATH).json(&body);
        if request.options.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let err = classify_error(status, &body);
            return Err(match retry_after {
                Some(delay) => err.with_retry_after(delay),
                None => err,
            });
        }

        if !request.options.stream {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
            let value: Value = serde_json::from_str(&body)
                .map_err(|e| LlmError::malformed(format!("Failed to parse response: {e}")))?;
            let text = full_text(&value).ok_or_else(|| {
                LlmError::malformed(format!("Response carried no answer text: {body}"))
            })?;
            return Ok(Box::pin(stream::once(async move { Ok(text) })));
        }

        Ok(parse_sse_stream(response))
    }
}

/// Turn a streaming response into answer chunks.
///
/// Ends at the `[DONE]` marker or when the connection closes. Events with
/// an empty delta are skipped.
fn parse_sse_stream(response: reqwest::Response) -> ChunkStream {
    let chunks = response
        .bytes_stream()
        .eventsource()
        .take_while(|item| {
            future::ready(!matches!(item, Ok(event) if event.data.trim() == DONE_MARKER))
        })
        .filter_map(|item| {
            future::ready(match item {
                Ok(event) => chunk_from_event(&event.data).transpose(),
                Err(e) => Some(Err(LlmError::network(format!("SSE stream error: {e}")))),
            })
        });

    Box::pin(chunks)
}

fn chunk_from_event(data: &str) -> Result<Option<String>, LlmError> {
    if data.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| LlmError::malformed(format!("Failed to parse stream event: {e}")))?;

    if value.get("choices").is_none() {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return Err(LlmError::new(LlmErrorKind::Service, message));
        }
    }

    let text = value
        .pointer("/choices/0/delta/content")
        .or_else(|| value.pointer("/choices/0/delta/text"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn full_text(value: &Value) -> Option<String> {
    value
        .pointer("/choices/0/message/content")
        .or_else(|| value.pointer("/choices/0/messages"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    LlmError::from_status(status.as_u16(), &detail)
}

// Cortex API types

#[derive(Debug, Serialize)]
struct CortexRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
    guardrails: Guardrails,
}

#[derive(Debug, Serialize)]
struct Guardrails {
    enabled: bool,
}

impl<'a> From<&'a CompletionRequest> for CortexRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            stream: request.options.stream,
            guardrails: Guardrails {
                enabled: request.options.guardrails,
            },
        }
    }
}
