//! Pure state transition function

use super::{Effect, Event, Notice, TurnContext, TurnError, TurnState};
use crate::analyst::AnalystResult;
use crate::answer_prompt::build_answer_messages;
use crate::llm::CompletionRequest;
use crate::session::{ContentPart, ProtocolMessage};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Turn already finished")]
    TurnFinished,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs this always produces the same outputs and performs
/// no I/O.
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Start + UserQuery -> QueryingAnalyst
        (TurnState::Start, Event::UserQuery { text }) => Ok(TransitionResult::new(
            TurnState::QueryingAnalyst { query: text.clone() },
        )
        .with_effect(Effect::AppendProtocol {
            message: ProtocolMessage::user_text(text),
        })
        .with_effect(Effect::CallAnalyst)),

        // ============================================================
        // Analyst reply
        // ============================================================
        (TurnState::QueryingAnalyst { .. }, Event::AnalystReplied { result: AnalystResult::Error { message } }) => {
            Ok(fail(TurnError::Analyst(message)))
        }

        (TurnState::QueryingAnalyst { .. }, Event::AnalystFailed { message }) => {
            Ok(fail(TurnError::AnalystRequest(message)))
        }

        (
            TurnState::QueryingAnalyst { query },
            Event::AnalystReplied {
                result:
                    AnalystResult::Ok {
                        texts,
                        statements,
                        suggestions,
                    },
            },
        ) => Ok(handle_analyst_answer(query, texts, statements, suggestions)),

        // ============================================================
        // SQL execution
        // ============================================================
        (TurnState::ExecutingSql { query, .. }, Event::SqlExecuted { result }) => {
            let request = CompletionRequest {
                model: context.summary_model.clone(),
                messages: build_answer_messages(query, &result),
                options: context.summary_options,
            };
            Ok(TransitionResult::new(TurnState::Summarizing)
                .with_effect(Effect::ShowTable { result })
                .with_effect(Effect::RequestSummary { request }))
        }

        (TurnState::ExecutingSql { .. }, Event::SqlFailed { message }) => {
            Ok(fail(TurnError::Execution(message)))
        }

        // ============================================================
        // Summary
        // ============================================================
        (TurnState::Summarizing, Event::DisplayFailed { message }) => {
            Ok(fail(TurnError::Display(message)))
        }

        (TurnState::Summarizing, Event::SummaryStarted) => {
            Ok(TransitionResult::new(TurnState::Streaming))
        }

        (TurnState::Summarizing, Event::SummaryFailed { message }) => {
            Ok(fail(TurnError::Summarization(message)))
        }

        (state, _) if state.is_terminal() => Err(TransitionError::TurnFinished),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} does not accept {}",
            state.name(),
            event.name()
        ))),
    }
}

fn fail(error: TurnError) -> TransitionResult {
    let chunk = error.to_chunk();
    TransitionResult::new(TurnState::Failed { error }).with_effect(Effect::Emit { chunk })
}

fn handle_analyst_answer(
    query: &str,
    texts: Vec<String>,
    statements: Vec<String>,
    suggestions: Vec<String>,
) -> TransitionResult {
    let has_sql = !statements.is_empty();

    let mut content: Vec<ContentPart> = texts.iter().map(ContentPart::text).collect();
    content.extend(statements.iter().map(ContentPart::sql));
    if !suggestions.is_empty() {
        content.push(ContentPart::Suggestions {
            suggestions: suggestions.clone(),
        });
    }

    let recorded = [
        Effect::RecordSql { has_sql },
        Effect::AppendProtocol {
            message: ProtocolMessage::analyst(content),
        },
    ];
    let suggestions_notice = (!suggestions.is_empty()).then(|| Effect::Notify {
        notice: Notice::Suggestions { suggestions },
    });

    let Some(first) = statements.into_iter().next() else {
        return TransitionResult::new(TurnState::Answered)
            .with_effects(recorded)
            .with_effects(suggestions_notice)
            .with_effect(Effect::emit(texts.join("\n")));
    };

    let statement = strip_trailing_semicolons(&first).to_string();
    TransitionResult::new(TurnState::ExecutingSql {
        query: query.to_string(),
        statement: statement.clone(),
    })
    .with_effects(recorded)
    .with_effects(texts.into_iter().map(Effect::info))
    .with_effects(suggestions_notice)
    .with_effect(Effect::Notify {
        notice: Notice::Sql { statement: first },
    })
    .with_effect(Effect::ExecuteSql { statement })
}

/// Remove statement terminators (and whitespace around them) from the end.
pub fn strip_trailing_semicolons(statement: &str) -> &str {
    statement.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}
