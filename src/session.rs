//! Conversation store
//!
//! A session keeps two parallel histories: the display history the user sees,
//! and the protocol history that is re-sent to the analyst service on every
//! turn. Both are append-only and are only ever cleared together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Display History
// ============================================================================

/// Who authored a display turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRole {
    User,
    Assistant,
}

/// A rendered chat bubble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayTurn {
    pub role: DisplayRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DisplayTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Protocol History
// ============================================================================

/// Role of a message in the analyst protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolRole {
    User,
    Analyst,
}

/// One typed item of a protocol message, in the analyst wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Sql { statement: String },
    Suggestions { suggestions: Vec<String> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn sql(statement: impl Into<String>) -> Self {
        ContentPart::Sql {
            statement: statement.into(),
        }
    }
}

/// A message exchanged with the analyst service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub role: ProtocolRole,
    pub content: Vec<ContentPart>,
}

impl ProtocolMessage {
    /// A user question as sent to the analyst
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ProtocolRole::User,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn analyst(content: Vec<ContentPart>) -> Self {
        Self {
            role: ProtocolRole::Analyst,
            content,
        }
    }
}

/// How much of the protocol history is sent to the analyst per turn.
///
/// Storage is never truncated; the window only limits what goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryWindow {
    /// Send the entire history
    #[default]
    Unbounded,
    /// Send the last `n` messages, starting at a user message
    LastMessages(usize),
}

impl HistoryWindow {
    /// Select the slice of `history` to send.
    ///
    /// A bounded window is advanced past leading analyst messages because the
    /// analyst protocol requires the conversation to open with a user turn.
    /// It is widened when needed so the newest user message is always sent.
    pub fn apply<'a>(&self, history: &'a [ProtocolMessage]) -> &'a [ProtocolMessage] {
        match *self {
            HistoryWindow::Unbounded => history,
            HistoryWindow::LastMessages(limit) => {
                let Some(newest_user) = history.iter().rposition(|m| m.role == ProtocolRole::User)
                else {
                    return &history[history.len()..];
                };
                let start = history.len().saturating_sub(limit).min(newest_user);
                let offset = history[start..]
                    .iter()
                    .position(|m| m.role == ProtocolRole::User)
                    .unwrap_or_default();
                &history[start + offset..]
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-user conversation state
#[derive(Debug, Default)]
pub struct Session {
    display: Vec<DisplayTurn>,
    protocol: Vec<ProtocolMessage>,
    last_turn_had_sql: bool,
}

/// Read-only copy of a session for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub display: Vec<DisplayTurn>,
    pub protocol: Vec<ProtocolMessage>,
    pub last_turn_had_sql: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_display(&mut self, turn: DisplayTurn) {
        self.display.push(turn);
    }

    pub fn append_protocol(&mut self, message: ProtocolMessage) {
        self.protocol.push(message);
    }

    pub fn set_last_turn_had_sql(&mut self, has_sql: bool) {
        self.last_turn_had_sql = has_sql;
    }

    pub fn last_turn_had_sql(&self) -> bool {
        self.last_turn_had_sql
    }

    pub fn display(&self) -> &[DisplayTurn] {
        &self.display
    }

    pub fn protocol(&self) -> &[ProtocolMessage] {
        &self.protocol
    }

    /// Clear both histories and the SQL flag in one step
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            display: self.display.clone(),
            protocol: self.protocol.clone(),
            last_turn_had_sql: self.last_turn_had_sql,
        }
    }
}
