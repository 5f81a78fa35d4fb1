//! Turn executor
//!
//! Drives the pure state machine for one question and performs its effects
//! against the analyst, warehouse, summarizer and renderer.

use super::traits::Renderer;
use crate::analyst::{parse_analyst_response, AnalystClient};
use crate::llm::{ChunkStream, CompletionClient};
use crate::session::{HistoryWindow, Session};
use crate::state_machine::{transition, Effect, Event, TurnContext, TurnError, TurnState};
use crate::warehouse::Warehouse;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

/// Answer chunks for one turn, in order
pub type AnswerStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// What performing one effect led to
enum Outcome {
    Done,
    Event(Event),
    Answer(AnswerStream),
    Streaming(AnswerStream),
}

/// Generic turn runtime that can work with any analyst, warehouse and
/// completion implementations
pub struct TurnRuntime<A, W, C>
where
    A: AnalystClient,
    W: Warehouse,
    C: CompletionClient,
{
    context: TurnContext,
    analyst: A,
    warehouse: W,
    completion: C,
    history_window: HistoryWindow,
}

impl<A, W, C> TurnRuntime<A, W, C>
where
    A: AnalystClient,
    W: Warehouse,
    C: CompletionClient,
{
    pub fn new(context: TurnContext, analyst: A, warehouse: W, completion: C) -> Self {
        Self {
            context,
            analyst,
            warehouse,
            completion,
            history_window: HistoryWindow::default(),
        }
    }

    pub fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.history_window = window;
        self
    }

    /// Answer one question.
    ///
    /// Session mutations happen before this returns; the stream only relays
    /// summary chunks and can be dropped at any point.
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        query: &str,
        renderer: &dyn Renderer,
    ) -> AnswerStream {
        let mut state = TurnState::Start;
        let mut pending: VecDeque<Effect> = VecDeque::new();
        let mut next_event = Some(Event::UserQuery {
            text: query.to_string(),
        });
        let mut answer: Option<AnswerStream> = None;

        loop {
            if let Some(event) = next_event.take() {
                let event_name = event.name();
                match transition(&state, &self.context, event) {
                    Ok(result) => {
                        tracing::debug!(
                            from = state.name(),
                            to = result.new_state.name(),
                            event = event_name,
                            "Turn transition"
                        );
                        state = result.new_state;
                        // Effects of the new event supersede whatever was left
                        pending = result.effects.into();
                    }
                    Err(e) => {
                        tracing::error!(state = state.name(), event = event_name, error = %e, "Rejected turn event");
                        return single(TurnError::Transition(e.to_string()).to_chunk());
                    }
                }
            }

            let Some(effect) = pending.pop_front() else {
                break;
            };

            match self.execute_effect(effect, session, renderer).await {
                Outcome::Done => {}
                Outcome::Event(event) => next_event = Some(event),
                Outcome::Answer(stream) => answer = Some(stream),
                Outcome::Streaming(stream) => {
                    answer = Some(stream);
                    next_event = Some(Event::SummaryStarted);
                }
            }
        }

        if let TurnState::Failed { error } = &state {
            tracing::warn!(error = %error, "Turn failed");
        } else {
            tracing::info!(state = state.name(), "Turn finished");
        }

        answer.unwrap_or_else(|| Box::pin(stream::empty()))
    }

    async fn execute_effect(
        &self,
        effect: Effect,
        session: &mut Session,
        renderer: &dyn Renderer,
    ) -> Outcome {
        match effect {
            Effect::AppendProtocol { message } => {
                session.append_protocol(message);
                Outcome::Done
            }

            Effect::RecordSql { has_sql } => {
                session.set_last_turn_had_sql(has_sql);
                Outcome::Done
            }

            Effect::CallAnalyst => {
                let history = self.history_window.apply(session.protocol());
                tracing::info!(
                    messages = history.len(),
                    stored = session.protocol().len(),
                    "Calling analyst"
                );
                match self.analyst.send(history).await {
                    Ok(raw) => Outcome::Event(Event::AnalystReplied {
                        result: parse_analyst_response(&raw),
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "Analyst call failed");
                        Outcome::Event(Event::AnalystFailed {
                            message: e.to_string(),
                        })
                    }
                }
            }

            Effect::Notify { notice } => {
                renderer.notice(&notice);
                Outcome::Done
            }

            Effect::ExecuteSql { statement } => {
                let start = std::time::Instant::now();
                match self.warehouse.execute(&statement).await {
                    Ok(result) => {
                        tracing::info!(
                            backend = self.warehouse.backend(),
                            rows = result.row_count(),
                            duration_ms = %start.elapsed().as_millis(),
                            "SQL executed"
                        );
                        Outcome::Event(Event::SqlExecuted { result })
                    }
                    Err(e) => {
                        tracing::warn!(backend = self.warehouse.backend(), error = %e, "SQL failed");
                        Outcome::Event(Event::SqlFailed {
                            message: e.to_string(),
                        })
                    }
                }
            }

            Effect::ShowTable { result } => match renderer.show_table(&result) {
                Ok(()) => Outcome::Done,
                Err(e) => Outcome::Event(Event::DisplayFailed {
                    message: e.to_string(),
                }),
            },

            Effect::RequestSummary { request } => {
                match self.completion.stream_complete(&request).await {
                    Ok(chunks) => Outcome::Streaming(relay(chunks)),
                    Err(e) => Outcome::Event(Event::SummaryFailed { message: e.message }),
                }
            }

            Effect::Emit { chunk } => Outcome::Answer(single(chunk)),
        }
    }
}

fn single(chunk: String) -> AnswerStream {
    Box::pin(stream::once(future::ready(chunk)))
}

/// Pass summary chunks through as they arrive. The first failure becomes a
/// final error chunk and ends the stream.
fn relay(chunks: ChunkStream) -> AnswerStream {
    Box::pin(chunks.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        future::ready(Some(match item {
            Ok(chunk) => chunk,
            Err(e) => {
                *failed = true;
                TurnError::Summarization(e.message).to_chunk()
            }
        }))
    }))
}
