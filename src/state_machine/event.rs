//! Events that drive a turn

use crate::analyst::AnalystResult;
use crate::warehouse::QueryResult;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserQuery { text: String },

    // Analyst events
    AnalystReplied { result: AnalystResult },
    AnalystFailed { message: String },

    // Warehouse events
    SqlExecuted { result: QueryResult },
    SqlFailed { message: String },

    // Renderer events
    DisplayFailed { message: String },

    // Summary events
    SummaryStarted,
    SummaryFailed { message: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserQuery { .. } => "user_query",
            Event::AnalystReplied { .. } => "analyst_replied",
            Event::AnalystFailed { .. } => "analyst_failed",
            Event::SqlExecuted { .. } => "sql_executed",
            Event::SqlFailed { .. } => "sql_failed",
            Event::DisplayFailed { .. } => "display_failed",
            Event::SummaryStarted => "summary_started",
            Event::SummaryFailed { .. } => "summary_failed",
        }
    }
}
