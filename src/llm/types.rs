//! Common types for completion requests

use serde::Serialize;

/// Completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub options: CompletionOptions,
}

/// Prompt message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

/// One prompt message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// Per-request completion settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOptions {
    /// Deliver the answer incrementally
    pub stream: bool,
    /// Ask the service to filter unsafe output
    pub guardrails: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            stream: true,
            guardrails: true,
        }
    }
}
