//! Turn state types

use crate::llm::CompletionOptions;
use thiserror::Error;

/// Lifecycle of a single question
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Nothing has happened yet
    #[default]
    Start,

    /// Waiting on the analyst service
    QueryingAnalyst { query: String },

    /// Running the generated statement
    ExecutingSql { query: String, statement: String },

    /// Showing the table and opening the summary stream
    Summarizing,

    /// Summary chunks are being relayed (terminal)
    Streaming,

    /// Analyst answered without SQL (terminal)
    Answered,

    /// Turn ended with an error chunk (terminal)
    Failed { error: TurnError },
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Streaming | TurnState::Answered | TurnState::Failed { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Start => "start",
            TurnState::QueryingAnalyst { .. } => "querying_analyst",
            TurnState::ExecutingSql { .. } => "executing_sql",
            TurnState::Summarizing => "summarizing",
            TurnState::Streaming => "streaming",
            TurnState::Answered => "answered",
            TurnState::Failed { .. } => "failed",
        }
    }
}

/// Errors that end a turn. Each renders as exactly one answer chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("{0}")]
    Analyst(String),
    #[error("Failed to reach the analyst service. {0}")]
    AnalystRequest(String),
    #[error("Failed to execute SQL. {0}")]
    Execution(String),
    #[error("Couldn't display SQL results. {0}")]
    Display(String),
    #[error("Unable to generate final answer. {0}")]
    Summarization(String),
    #[error("Unexpected turn state: {0}")]
    Transition(String),
}

impl TurnError {
    /// The chunk shown to the user in place of an answer
    pub fn to_chunk(&self) -> String {
        format!("**Error**: {self}")
    }
}

/// Static configuration shared by every turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    pub summary_model: String,
    pub summary_options: CompletionOptions,
}

impl TurnContext {
    pub fn new(summary_model: impl Into<String>, guardrails: bool) -> Self {
        Self {
            summary_model: summary_model.into(),
            summary_options: CompletionOptions {
                stream: true,
                guardrails,
            },
        }
    }
}
