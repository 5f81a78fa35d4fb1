//! Analyst chat - conversational access to structured data
//!
//! Questions go to Cortex Analyst, the generated SQL runs on a warehouse, and
//! the results are summarized into a streamed answer.

mod analyst;
mod answer_prompt;
mod api;
mod config;
mod llm;
mod runtime;
mod session;
mod snowflake;
mod state_machine;
mod warehouse;

use analyst::{AnalystClient, CortexAnalystClient};
use api::{create_router, AppState};
use config::{Config, WarehouseBackend};
use llm::{CompletionClient, CortexCompleteService, LoggingService};
use runtime::{SharedRuntime, TurnRuntime};
use snowflake::SnowflakeConnection;
use state_machine::TurnContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warehouse::{SnowflakeWarehouse, SqliteWarehouse, StatementContext, Warehouse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analyst_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env()?;
    tracing::info!(
        account = %config.snowflake.account_url,
        semantic_model = %config.analyst.semantic_model_file,
        summary_model = %config.summary.model,
        "Configuration loaded"
    );

    let connection = SnowflakeConnection::from_config(&config.snowflake);

    let analyst: Arc<dyn AnalystClient> = Arc::new(
        CortexAnalystClient::new(connection.clone(), &config.analyst.semantic_model_file)
            .with_timeout(config.analyst.timeout),
    );

    let warehouse: Arc<dyn Warehouse> = match &config.warehouse {
        WarehouseBackend::Snowflake => Arc::new(SnowflakeWarehouse::new(
            connection.clone(),
            StatementContext::from_config(&config.snowflake),
        )),
        WarehouseBackend::Sqlite { path } => {
            tracing::info!(path = %path.display(), "Using SQLite warehouse");
            Arc::new(SqliteWarehouse::open(path)?)
        }
    };

    let completion: Arc<dyn CompletionClient> = Arc::new(LoggingService::new(Arc::new(
        CortexCompleteService::new(connection),
    )));

    let runtime: SharedRuntime = TurnRuntime::new(
        TurnContext::new(&config.summary.model, config.summary.guardrails),
        analyst,
        warehouse,
        completion,
    )
    .with_history_window(config.history_window);

    // Create application state
    let state = AppState::new(runtime);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Analyst chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
