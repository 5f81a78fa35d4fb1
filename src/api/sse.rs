//! Server-Sent Events for a running turn

use crate::state_machine::Notice;
use crate::warehouse::QueryResult;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Events sent to the client while a turn runs
#[derive(Debug, Clone)]
pub enum TurnEvent {
    Notice { notice: Notice },
    Table { result: QueryResult },
    Chunk { text: String },
    Done { answer: String },
}

/// Convert the turn's event channel to an SSE response. The stream ends when
/// the turn task drops its sender.
pub fn sse_stream(
    rx: UnboundedReceiver<TurnEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = UnboundedReceiverStream::new(rx).map(|event| Ok(turn_event_to_axum(event)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn turn_event_to_axum(event: TurnEvent) -> Event {
    let (event_type, data) = match event {
        TurnEvent::Notice { notice } => ("notice", json!(notice)),
        TurnEvent::Table { result } => (
            "table",
            json!({
                "columns": result.columns,
                "rows": result.rows
            }),
        ),
        TurnEvent::Chunk { text } => ("chunk", json!({ "text": text })),
        TurnEvent::Done { answer } => ("done", json!({ "answer": answer })),
    };

    Event::default().event(event_type).data(data.to_string())
}
