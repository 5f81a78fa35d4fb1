//! Mock implementations for testing
//!
//! These mocks enable turn-level testing without real I/O.

use super::traits::*;
use crate::analyst::{AnalystClient, AnalystError};
use crate::llm::{ChunkStream, CompletionClient, CompletionRequest, LlmError};
use crate::session::ProtocolMessage;
use crate::state_machine::Notice;
use crate::warehouse::{QueryResult, Warehouse, WarehouseError};
use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock Analyst Client
// ============================================================================

/// Mock analyst that returns queued raw responses
#[derive(Default)]
pub struct MockAnalystClient {
    responses: Mutex<VecDeque<Result<Value, AnalystError>>>,
    /// Record of every history sent
    pub requests: Mutex<Vec<Vec<ProtocolMessage>>>,
}

impl MockAnalystClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response body
    pub fn queue_response(&self, response: Value) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a call failure
    pub fn queue_error(&self, error: AnalystError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<Vec<ProtocolMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalystClient for MockAnalystClient {
    async fn send(&self, messages: &[ProtocolMessage]) -> Result<Value, AnalystError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnalystError::Request("No mock response queued".into())))
    }
}

// ============================================================================
// Mock Warehouse
// ============================================================================

/// Mock warehouse that returns queued results
#[derive(Default)]
pub struct MockWarehouse {
    results: Mutex<VecDeque<Result<QueryResult, WarehouseError>>>,
    /// Record of executed statements
    pub statements: Mutex<Vec<String>>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_result(&self, result: QueryResult) {
        self.results.lock().unwrap().push_back(Ok(result));
    }

    pub fn queue_error(&self, error: WarehouseError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WarehouseError::Request("No mock result queued".into())))
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

// ============================================================================
// Mock Completion Client
// ============================================================================

type QueuedCompletion = Result<Vec<Result<String, LlmError>>, LlmError>;

/// Mock summarizer that replays queued chunk sequences
#[derive(Default)]
pub struct MockCompletionClient {
    completions: Mutex<VecDeque<QueuedCompletion>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream that yields each chunk successfully
    pub fn queue_chunks(&self, chunks: &[&str]) {
        let items = chunks.iter().map(|c| Ok((*c).to_string())).collect();
        self.completions.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a stream with arbitrary items, failures included
    pub fn queue_items(&self, items: Vec<Result<String, LlmError>>) {
        self.completions.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a failure to start
    pub fn queue_error(&self, error: LlmError) {
        self.completions.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn stream_complete(&self, request: &CompletionRequest) -> Result<ChunkStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let items = self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock completion queued")))?;
        Ok(Box::pin(stream::iter(items)))
    }
}

// ============================================================================
// Recording Renderer
// ============================================================================

/// Renderer that records what it was asked to show
#[derive(Default)]
pub struct RecordingRenderer {
    pub notices: Mutex<Vec<Notice>>,
    pub tables: Mutex<Vec<QueryResult>>,
    fail_tables: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose table display always fails
    pub fn failing_tables() -> Self {
        Self {
            fail_tables: true,
            ..Self::default()
        }
    }

    pub fn recorded_notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn recorded_tables(&self) -> Vec<QueryResult> {
        self.tables.lock().unwrap().clone()
    }
}

impl Renderer for RecordingRenderer {
    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn show_table(&self, result: &QueryResult) -> Result<(), DisplayError> {
        if self.fail_tables {
            return Err(DisplayError("table renderer unavailable".into()));
        }
        self.tables.lock().unwrap().push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptRole;
    use crate::runtime::{AnswerStream, TurnRuntime};
    use crate::session::{ContentPart, HistoryWindow, ProtocolRole, Session};
    use crate::state_machine::TurnContext;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;

    type MockRuntime =
        TurnRuntime<Arc<MockAnalystClient>, Arc<MockWarehouse>, Arc<MockCompletionClient>>;

    struct Harness {
        analyst: Arc<MockAnalystClient>,
        warehouse: Arc<MockWarehouse>,
        completion: Arc<MockCompletionClient>,
        runtime: MockRuntime,
    }

    fn harness() -> Harness {
        harness_with_window(HistoryWindow::Unbounded)
    }

    fn harness_with_window(window: HistoryWindow) -> Harness {
        let analyst = Arc::new(MockAnalystClient::new());
        let warehouse = Arc::new(MockWarehouse::new());
        let completion = Arc::new(MockCompletionClient::new());
        let runtime = TurnRuntime::new(
            TurnContext::new("claude-3-5-sonnet", true),
            analyst.clone(),
            warehouse.clone(),
            completion.clone(),
        )
        .with_history_window(window);
        Harness {
            analyst,
            warehouse,
            completion,
            runtime,
        }
    }

    fn analyst_message(content: Value) -> Value {
        json!({ "message": { "role": "analyst", "content": content } })
    }

    fn revenue_table() -> QueryResult {
        QueryResult::new(
            vec!["SALES_REGION".into(), "MAX_REVENUE".into()],
            vec![
                vec![json!("North America"), json!(1200)],
                vec![json!("Europe"), json!(950)],
            ],
        )
    }

    async fn collect(stream: AnswerStream) -> Vec<String> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_text_only_answer() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "text", "text": "  I can answer questions about revenue.  "},
            {"type": "text", "text": "Ask me about regions."}
        ])));

        let mut session = Session::new();
        let renderer = RecordingRenderer::new();
        let chunks = collect(h.runtime.handle_turn(&mut session, "hi", &renderer).await).await;

        assert_eq!(
            chunks,
            vec!["I can answer questions about revenue.\nAsk me about regions."]
        );
        assert_eq!(session.protocol().len(), 2);
        assert!(!session.last_turn_had_sql());
        assert!(renderer.recorded_notices().is_empty());
        assert!(h.warehouse.recorded_statements().is_empty());
    }

    #[tokio::test]
    async fn test_sql_answer_is_summarized() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "text", "text": "This is our interpretation of your question."},
            {"type": "sql", "statement": "SELECT sales_region, MAX(revenue) FROM t GROUP BY 1;"}
        ])));
        h.warehouse.queue_result(revenue_table());
        h.completion
            .queue_chunks(&["North America ", "had the highest revenue."]);

        let query = "What is the highest revenue in each sales region?";
        let mut session = Session::new();
        let renderer = RecordingRenderer::new();
        let chunks = collect(h.runtime.handle_turn(&mut session, query, &renderer).await).await;

        assert_eq!(chunks, vec!["North America ", "had the highest revenue."]);
        assert_eq!(
            h.warehouse.recorded_statements(),
            vec!["SELECT sales_region, MAX(revenue) FROM t GROUP BY 1"]
        );
        assert_eq!(
            renderer.recorded_notices(),
            vec![
                Notice::Info {
                    text: "This is our interpretation of your question.".into()
                },
                Notice::Sql {
                    statement: "SELECT sales_region, MAX(revenue) FROM t GROUP BY 1;".into()
                },
            ]
        );
        assert_eq!(renderer.recorded_tables(), vec![revenue_table()]);

        let requests = h.completion.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "claude-3-5-sonnet");
        assert!(requests[0].options.stream);
        assert!(requests[0].options.guardrails);
        assert_eq!(requests[0].messages[0].role, PromptRole::System);
        assert!(requests[0].messages[1]
            .content
            .contains("| North America | 1200 |"));
        assert!(requests[0].messages[1].content.contains(query));

        assert!(session.last_turn_had_sql());
        assert_eq!(session.protocol().len(), 2);
        assert_eq!(session.protocol()[1].role, ProtocolRole::Analyst);
    }

    #[tokio::test]
    async fn test_analyst_error_list() {
        let h = harness();
        h.analyst
            .queue_response(json!([{ "content": " Semantic model not found " }]));

        let mut session = Session::new();
        let renderer = RecordingRenderer::new();
        let chunks = collect(h.runtime.handle_turn(&mut session, "q", &renderer).await).await;

        assert_eq!(chunks, vec!["**Error**: Semantic model not found"]);
        assert_eq!(session.protocol().len(), 1);
        assert_eq!(session.protocol()[0].role, ProtocolRole::User);
    }

    #[tokio::test]
    async fn test_analyst_error_status_reaches_parser() {
        use crate::analyst::CortexAnalystClient;
        use crate::snowflake::SnowflakeConnection;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/cortex/analyst/message"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!([{"content": "semantic model not found"}])),
            )
            .mount(&server)
            .await;

        let analyst = Arc::new(CortexAnalystClient::new(
            SnowflakeConnection::new(server.uri(), "tok", "OAUTH"),
            "@db.schema.stage/model.yaml",
        ));
        let warehouse = Arc::new(MockWarehouse::new());
        let completion = Arc::new(MockCompletionClient::new());
        let runtime = TurnRuntime::new(
            TurnContext::new("claude-3-5-sonnet", true),
            analyst,
            warehouse.clone(),
            completion.clone(),
        );

        let mut session = Session::new();
        let chunks = collect(
            runtime
                .handle_turn(&mut session, "q", &RecordingRenderer::new())
                .await,
        )
        .await;

        assert_eq!(chunks, vec!["**Error**: semantic model not found"]);
        assert_eq!(session.protocol().len(), 1);
        assert!(warehouse.recorded_statements().is_empty());
        assert!(completion.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_analyst_output() {
        let h = harness();
        h.analyst.queue_response(json!("surprise"));

        let mut session = Session::new();
        let chunks = collect(
            h.runtime
                .handle_turn(&mut session, "q", &RecordingRenderer::new())
                .await,
        )
        .await;

        assert_eq!(chunks, vec!["**Error**: could not parse output"]);
        assert_eq!(session.protocol().len(), 1);
    }

    #[tokio::test]
    async fn test_analyst_transport_failure() {
        let h = harness();
        h.analyst
            .queue_error(AnalystError::Request("timed out after 50000 ms".into()));

        let mut session = Session::new();
        let chunks = collect(
            h.runtime
                .handle_turn(&mut session, "q", &RecordingRenderer::new())
                .await,
        )
        .await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("**Error**: Failed to reach the analyst service."));
        assert!(chunks[0].contains("timed out after 50000 ms"));
        assert_eq!(session.protocol().len(), 1);
    }

    #[tokio::test]
    async fn test_sql_failure_keeps_analyst_message() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "sql", "statement": "SELECT * FROM missing"}
        ])));
        h.warehouse.queue_error(WarehouseError::Statement {
            code: "002003".into(),
            message: "Object 'MISSING' does not exist".into(),
        });

        let mut session = Session::new();
        let chunks = collect(
            h.runtime
                .handle_turn(&mut session, "q", &RecordingRenderer::new())
                .await,
        )
        .await;

        assert_eq!(
            chunks,
            vec![
                "**Error**: Failed to execute SQL. SQL compilation or execution error 002003: Object 'MISSING' does not exist"
            ]
        );
        assert_eq!(session.protocol().len(), 2);
        assert!(session.last_turn_had_sql());
        assert!(h.completion.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_display_failure_skips_summary() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "sql", "statement": "SELECT 1"}
        ])));
        h.warehouse.queue_result(revenue_table());

        let mut session = Session::new();
        let renderer = RecordingRenderer::failing_tables();
        let chunks = collect(h.runtime.handle_turn(&mut session, "q", &renderer).await).await;

        assert_eq!(
            chunks,
            vec!["**Error**: Couldn't display SQL results. table renderer unavailable"]
        );
        assert!(h.completion.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_summary_fails_to_start() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "sql", "statement": "SELECT 1"}
        ])));
        h.warehouse.queue_result(revenue_table());
        h.completion
            .queue_error(LlmError::from_status(400, "model not available"));

        let mut session = Session::new();
        let chunks = collect(
            h.runtime
                .handle_turn(&mut session, "q", &RecordingRenderer::new())
                .await,
        )
        .await;

        assert_eq!(
            chunks,
            vec![
                "**Error**: Unable to generate final answer. Request rejected (400): model not available"
            ]
        );
    }

    #[tokio::test]
    async fn test_summary_fails_mid_stream() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "sql", "statement": "SELECT 1"}
        ])));
        h.warehouse.queue_result(revenue_table());
        h.completion.queue_items(vec![
            Ok("Partial ".to_string()),
            Err(LlmError::network("connection reset")),
            Ok("never seen".to_string()),
        ]);

        let mut session = Session::new();
        let chunks = collect(
            h.runtime
                .handle_turn(&mut session, "q", &RecordingRenderer::new())
                .await,
        )
        .await;

        assert_eq!(
            chunks,
            vec![
                "Partial ",
                "**Error**: Unable to generate final answer. connection reset"
            ]
        );
    }

    #[tokio::test]
    async fn test_suggestions_surface_as_notices() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "text", "text": "Your question is ambiguous."},
            {"type": "suggestions", "suggestions": ["Revenue by region?", "Revenue by month?"]}
        ])));

        let mut session = Session::new();
        let renderer = RecordingRenderer::new();
        let chunks = collect(h.runtime.handle_turn(&mut session, "q", &renderer).await).await;

        assert_eq!(chunks, vec!["Your question is ambiguous."]);
        assert_eq!(
            renderer.recorded_notices(),
            vec![Notice::Suggestions {
                suggestions: vec!["Revenue by region?".into(), "Revenue by month?".into()]
            }]
        );
        assert!(matches!(
            session.protocol()[1].content.last(),
            Some(ContentPart::Suggestions { suggestions }) if suggestions.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_history_grows_by_turns_and_parses() {
        let h = harness();
        h.analyst
            .queue_response(analyst_message(json!([{"type": "text", "text": "one"}])));
        h.analyst.queue_response(json!([{ "content": "bad" }]));
        h.analyst
            .queue_response(analyst_message(json!([{"type": "text", "text": "three"}])));

        let mut session = Session::new();
        let renderer = RecordingRenderer::new();
        for query in ["first", "second", "third"] {
            let _ = collect(h.runtime.handle_turn(&mut session, query, &renderer).await).await;
        }

        // 3 user messages + 2 successful parses
        assert_eq!(session.protocol().len(), 5);

        let requests = h.analyst.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].len(), 1);
        assert_eq!(requests[1].len(), 3);
        assert_eq!(requests[2].len(), 4);
    }

    #[tokio::test]
    async fn test_history_window_limits_sent_messages() {
        let h = harness_with_window(HistoryWindow::LastMessages(2));
        h.analyst
            .queue_response(analyst_message(json!([{"type": "text", "text": "one"}])));
        h.analyst
            .queue_response(analyst_message(json!([{"type": "text", "text": "two"}])));

        let mut session = Session::new();
        let renderer = RecordingRenderer::new();
        for query in ["first", "second"] {
            let _ = collect(h.runtime.handle_turn(&mut session, query, &renderer).await).await;
        }

        let requests = h.analyst.recorded_requests();
        // [user, analyst, user] windowed to the last two, then advanced to the user turn
        assert_eq!(requests[1], vec![ProtocolMessage::user_text("second")]);
        assert_eq!(session.protocol().len(), 4);
    }

    #[tokio::test]
    async fn test_smallest_window_still_sends_question() {
        let h = harness_with_window(HistoryWindow::LastMessages(0));
        h.analyst
            .queue_response(analyst_message(json!([{"type": "text", "text": "one"}])));

        let mut session = Session::new();
        let _ = collect(
            h.runtime
                .handle_turn(&mut session, "first", &RecordingRenderer::new())
                .await,
        )
        .await;

        let requests = h.analyst.recorded_requests();
        assert_eq!(requests[0], vec![ProtocolMessage::user_text("first")]);
    }

    #[tokio::test]
    async fn test_dropping_stream_early_is_fine() {
        let h = harness();
        h.analyst.queue_response(analyst_message(json!([
            {"type": "sql", "statement": "SELECT 1"}
        ])));
        h.warehouse.queue_result(revenue_table());
        h.completion.queue_chunks(&["a", "b", "c"]);

        let mut session = Session::new();
        let mut stream = h
            .runtime
            .handle_turn(&mut session, "q", &RecordingRenderer::new())
            .await;
        assert_eq!(stream.next().await.as_deref(), Some("a"));
        drop(stream);

        assert_eq!(session.protocol().len(), 2);
    }
}
