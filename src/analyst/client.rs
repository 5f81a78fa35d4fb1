//! Cortex Analyst REST client

use super::AnalystClient;
use crate::session::ProtocolMessage;
use crate::snowflake::SnowflakeConnection;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const ANALYST_PATH: &str = "/api/v2/cortex/analyst/message";

/// Default request timeout for analyst calls
pub const DEFAULT_ANALYST_TIMEOUT: Duration = Duration::from_millis(50_000);

/// Failure to obtain a response from the analyst service
#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("Analyst request failed: {0}")]
    Request(String),
    #[error("Analyst returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode analyst response: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct AnalystRequest<'a> {
    messages: &'a [ProtocolMessage],
    semantic_model_file: &'a str,
}

/// Analyst client bound to one semantic model
#[derive(Debug, Clone)]
pub struct CortexAnalystClient {
    connection: SnowflakeConnection,
    semantic_model_file: String,
    timeout: Duration,
}

impl CortexAnalystClient {
    pub fn new(connection: SnowflakeConnection, semantic_model_file: impl Into<String>) -> Self {
        Self {
            connection,
            semantic_model_file: semantic_model_file.into(),
            timeout: DEFAULT_ANALYST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AnalystClient for CortexAnalystClient {
    async fn send(&self, messages: &[ProtocolMessage]) -> Result<Value, AnalystError> {
        let request = AnalystRequest {
            messages,
            semantic_model_file: &self.semantic_model_file,
        };

        let response = self
            .connection
            .post(ANALYST_PATH)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalystError::Request(format!(
                        "timed out after {} ms",
                        self.timeout.as_millis()
                    ))
                } else {
                    AnalystError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalystError::Request(format!("Failed to read response: {e}")))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| AnalystError::Decode(e.to_string()));
        }

        // Error records come back with a non-2xx status; the parser classifies
        // any JSON body, so only opaque bodies are a call failure.
        match serde_json::from_str::<Value>(&body) {
            Ok(raw) => {
                tracing::warn!(status = status.as_u16(), "Analyst returned an error response");
                Ok(raw)
            }
            Err(_) => Err(AnalystError::Status {
                status: status.as_u16(),
                message: body.trim().to_string(),
            }),
        }
    }
}
