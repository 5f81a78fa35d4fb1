//! Effects produced by state transitions

use crate::llm::CompletionRequest;
use crate::session::ProtocolMessage;
use crate::warehouse::QueryResult;
use serde::Serialize;

/// Side information surfaced before the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Interpretation text from the analyst
    Info { text: String },
    /// Follow-up questions the analyst proposed
    Suggestions { suggestions: Vec<String> },
    /// The statement about to run, as the analyst wrote it
    Sql { statement: String },
}

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append to the session's protocol history
    AppendProtocol { message: ProtocolMessage },

    /// Record whether this turn produced SQL
    RecordSql { has_sql: bool },

    /// Send the (windowed) protocol history to the analyst
    CallAnalyst,

    /// Surface a notice through the renderer
    Notify { notice: Notice },

    /// Run a statement on the warehouse
    ExecuteSql { statement: String },

    /// Hand a result table to the renderer
    ShowTable { result: QueryResult },

    /// Open the summary stream
    RequestSummary { request: CompletionRequest },

    /// Yield one answer chunk and end the turn
    Emit { chunk: String },
}

impl Effect {
    pub fn info(text: impl Into<String>) -> Self {
        Effect::Notify {
            notice: Notice::Info { text: text.into() },
        }
    }

    pub fn emit(chunk: impl Into<String>) -> Self {
        Effect::Emit {
            chunk: chunk.into(),
        }
    }
}
